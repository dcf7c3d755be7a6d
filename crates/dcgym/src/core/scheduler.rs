//! Space-shared execution of cloudlets on the cores of a single VM.

use std::collections::VecDeque;

use dcgym_core::event::EventId;
use dcgym_core::EPSILON;

use crate::core::cloudlet::{Cloudlet, CloudletStatus};

/// A cloudlet occupying cores of the VM, together with its execution rate
/// and the pending completion event.
struct ExecutingEntry {
    cloudlet: Cloudlet,
    /// Million instructions per second, `mips_per_pe x pes`.
    rate: f64,
    completion_event: Option<EventId>,
}

/// A cloudlet that has just been granted cores.
///
/// The caller is expected to schedule its completion after `eta` seconds and
/// register the resulting event id via
/// [`set_completion_event`](CloudletScheduler::set_completion_event).
pub struct StartedCloudlet {
    pub cloudlet_id: u32,
    pub eta: f64,
}

/// Space-shared cloudlet scheduler.
///
/// Each executing cloudlet exclusively occupies `pes` cores until it
/// completes; cloudlets that do not fit wait in FIFO order. Since shares are
/// never resized, completion times are exact and are scheduled as events by
/// the owning datacenter.
pub struct CloudletScheduler {
    pes: u32,
    mips_per_pe: f64,
    executing: Vec<ExecutingEntry>,
    waiting: VecDeque<Cloudlet>,
}

impl CloudletScheduler {
    pub fn new(pes: u32, mips_per_pe: f64) -> Self {
        Self {
            pes,
            mips_per_pe,
            executing: Vec::new(),
            waiting: VecDeque::new(),
        }
    }

    pub fn used_pes(&self) -> u32 {
        self.executing.iter().map(|e| e.cloudlet.pes).sum()
    }

    pub fn free_pes(&self) -> u32 {
        self.pes - self.used_pes()
    }

    pub fn executing_count(&self) -> usize {
        self.executing.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Core demands of all cloudlets held by the scheduler, executing first.
    pub fn cloudlet_pes(&self) -> Vec<u32> {
        self.executing
            .iter()
            .map(|e| e.cloudlet.pes)
            .chain(self.waiting.iter().map(|c| c.pes))
            .collect()
    }

    /// Accepts a cloudlet, starting it if enough cores are free and queueing
    /// it otherwise.
    pub fn submit(&mut self, cloudlet: Cloudlet, time: f64) -> Option<StartedCloudlet> {
        if cloudlet.pes <= self.free_pes() {
            Some(self.start(cloudlet, time))
        } else {
            self.waiting.push_back(cloudlet);
            None
        }
    }

    fn start(&mut self, mut cloudlet: Cloudlet, time: f64) -> StartedCloudlet {
        let rate = self.mips_per_pe * cloudlet.pes as f64;
        cloudlet.status = CloudletStatus::InExec;
        cloudlet.exec_start_time = time;
        let eta = cloudlet.remaining() / rate;
        let id = cloudlet.id;
        self.executing.push(ExecutingEntry {
            cloudlet,
            rate,
            completion_event: None,
        });
        StartedCloudlet { cloudlet_id: id, eta }
    }

    /// Records the engine event that will complete the given cloudlet.
    pub fn set_completion_event(&mut self, cloudlet_id: u32, event_id: EventId) {
        if let Some(entry) = self.executing.iter_mut().find(|e| e.cloudlet.id == cloudlet_id) {
            entry.completion_event = Some(event_id);
        }
    }

    /// Completes the given cloudlet and pulls waiting cloudlets onto the
    /// freed cores in FIFO order.
    ///
    /// Returns the finished cloudlet and the newly started ones.
    pub fn on_completion(&mut self, cloudlet_id: u32, time: f64) -> (Option<Cloudlet>, Vec<StartedCloudlet>) {
        let position = self.executing.iter().position(|e| e.cloudlet.id == cloudlet_id);
        let finished = match position {
            Some(position) => {
                let mut entry = self.executing.remove(position);
                entry.cloudlet.finished_length = entry.cloudlet.length;
                entry.cloudlet.status = CloudletStatus::Success;
                entry.cloudlet.finish_time = time;
                entry.cloudlet
            }
            None => return (None, Vec::new()),
        };
        let mut started = Vec::new();
        while let Some(head) = self.waiting.front() {
            if head.pes > self.free_pes() {
                break;
            }
            let cloudlet = self.waiting.pop_front().unwrap();
            started.push(self.start(cloudlet, time));
        }
        (Some(finished), started)
    }

    /// Empties the scheduler when its VM is destroyed.
    ///
    /// Executing cloudlets are credited with the work done so far
    /// (`elapsed x rate` million instructions); those that turn out to be
    /// complete are finished in place. Everything else is handed back for
    /// re-queueing along with the completion events to cancel.
    pub fn drain(&mut self, time: f64) -> DrainedCloudlets {
        let mut result = DrainedCloudlets::default();
        for mut entry in self.executing.drain(..) {
            if let Some(event_id) = entry.completion_event {
                result.events_to_cancel.push(event_id);
            }
            let elapsed = (time - entry.cloudlet.exec_start_time).max(0.);
            entry.cloudlet.finished_length = (entry.cloudlet.finished_length + elapsed * entry.rate)
                .min(entry.cloudlet.length);
            if entry.cloudlet.remaining() <= EPSILON {
                entry.cloudlet.finished_length = entry.cloudlet.length;
                entry.cloudlet.status = CloudletStatus::Success;
                entry.cloudlet.finish_time = time;
                result.finished.push(entry.cloudlet);
            } else {
                result.interrupted.push(entry.cloudlet);
            }
        }
        result.interrupted.extend(self.waiting.drain(..));
        result
    }
}

/// Cloudlets harvested from a destroyed VM.
#[derive(Default)]
pub struct DrainedCloudlets {
    /// Cloudlets whose remaining length reached zero at drain time.
    pub finished: Vec<Cloudlet>,
    /// Cloudlets with work left, to be reset and re-queued by the broker.
    pub interrupted: Vec<Cloudlet>,
    /// Pending completion events that must be cancelled.
    pub events_to_cancel: Vec<EventId>,
}
