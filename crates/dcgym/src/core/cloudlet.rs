//! Representation of a unit of work and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Status of cloudlet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CloudletStatus {
    Waiting,
    InExec,
    Success,
    Failed,
    Cancelled,
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Waiting => write!(f, "waiting"),
            CloudletStatus::InExec => write!(f, "in_exec"),
            CloudletStatus::Success => write!(f, "success"),
            CloudletStatus::Failed => write!(f, "failed"),
            CloudletStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Represents a single compute task.
///
/// A cloudlet is owned by the broker while it waits for dispatch, moves into
/// its VM's scheduler for execution, and returns to the broker once finished
/// or when the VM is destroyed underneath it. On destruction the remaining
/// work is preserved: `length` is reduced by the executed part and the
/// cloudlet is re-queued.
#[derive(Clone, Debug, Serialize)]
pub struct Cloudlet {
    pub id: u32,
    /// Number of cores the cloudlet occupies while executing.
    pub pes: u32,
    /// Remaining work in million instructions.
    pub length: f64,
    pub file_size_in: u64,
    pub file_size_out: u64,
    /// Absolute simulation time of arrival at the broker.
    pub arrival_time: f64,
    /// Delay between dispatch and submission to the datacenter.
    pub submission_delay: f64,
    pub status: CloudletStatus,
    /// VM the cloudlet is bound to, if any.
    pub vm_id: Option<u32>,
    pub exec_start_time: f64,
    pub wait_start_time: f64,
    pub finish_time: f64,
    /// Work executed so far within the current binding, in million instructions.
    pub finished_length: f64,
}

impl Cloudlet {
    pub fn new(id: u32, pes: u32, length: f64, file_size_in: u64, file_size_out: u64, arrival_time: f64) -> Self {
        Self {
            id,
            pes,
            length,
            file_size_in,
            file_size_out,
            arrival_time,
            submission_delay: 0.,
            status: CloudletStatus::Waiting,
            vm_id: None,
            exec_start_time: -1.,
            wait_start_time: -1.,
            finish_time: -1.,
            finished_length: 0.,
        }
    }

    /// Work left to execute, in million instructions.
    pub fn remaining(&self) -> f64 {
        (self.length - self.finished_length).max(0.)
    }

    /// Resets the cloudlet for re-queueing after it has lost its VM.
    ///
    /// The executed part is credited by shrinking `length` to the remaining
    /// work, so the cloudlet can be dispatched again as if it had just
    /// arrived at `time`.
    pub fn reset_for_requeue(&mut self, time: f64) {
        self.length = self.remaining();
        self.finished_length = 0.;
        self.status = CloudletStatus::Waiting;
        self.vm_id = None;
        self.submission_delay = 0.;
        self.arrival_time = time;
        self.exec_start_time = -1.;
        self.finish_time = -1.;
    }
}
