//! Representations of virtual machine and its status.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::scheduler::CloudletScheduler;

/// Size class of virtual machine.
///
/// Medium and Large resources are derived from the Small footprint via the
/// configured multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmType {
    Small,
    Medium,
    Large,
}

impl VmType {
    /// Numeric code used in observations: 1 = Small, 2 = Medium, 3 = Large
    /// (0 is reserved for empty VM slots).
    pub fn code(&self) -> i64 {
        match self {
            VmType::Small => 1,
            VmType::Medium => 2,
            VmType::Large => 3,
        }
    }

    /// Decodes the external type index (0 = Small, 1 = Medium, 2 = Large).
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(VmType::Small),
            1 => Some(VmType::Medium),
            2 => Some(VmType::Large),
            _ => None,
        }
    }
}

impl Display for VmType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmType::Small => write!(f, "S"),
            VmType::Medium => write!(f, "M"),
            VmType::Large => write!(f, "L"),
        }
    }
}

/// Status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Requested,
    Starting,
    Running,
    ShuttingDown,
    Destroyed,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Requested => write!(f, "requested"),
            VmStatus::Starting => write!(f, "starting"),
            VmStatus::Running => write!(f, "running"),
            VmStatus::ShuttingDown => write!(f, "shutting_down"),
            VmStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Resource requirements of a virtual machine.
#[derive(Clone, Debug, Serialize)]
pub struct VmSpec {
    pub id: u32,
    pub vm_type: VmType,
    pub pes: u32,
    pub mips_per_pe: f64,
    pub ram: u64,
    pub bandwidth: u64,
    pub storage: u64,
    /// Host explicitly chosen by the agent; cleared once honored by the
    /// placement policy.
    pub requested_host: Option<u32>,
}

impl VmSpec {
    /// Builds the spec of a VM of the given type, scaling the configured
    /// Small footprint by the type multiplier.
    pub fn for_type(id: u32, vm_type: VmType, config: &SimulationConfig) -> Self {
        let multiplier = match vm_type {
            VmType::Small => 1,
            VmType::Medium => config.medium_vm_multiplier,
            VmType::Large => config.large_vm_multiplier,
        };
        Self {
            id,
            vm_type,
            pes: config.small_vm_pes * multiplier,
            mips_per_pe: config.host_pe_mips,
            ram: config.small_vm_ram * multiplier as u64,
            bandwidth: config.small_vm_bw * multiplier as u64,
            storage: config.small_vm_storage * multiplier as u64,
            requested_host: None,
        }
    }
}

/// A point of the VM utilization history.
#[derive(Clone, Debug, Serialize)]
pub struct VmStateEntry {
    pub time: f64,
    pub cpu_load: f64,
    pub used_pes: u32,
}

/// Represents virtual machine (VM) placed on a host.
///
/// The VM executes cloudlets through its embedded space-shared scheduler and
/// records a utilization history point on every load change.
pub struct Vm {
    pub spec: VmSpec,
    pub host_id: u32,
    pub status: VmStatus,
    pub created_time: f64,
    pub scheduler: CloudletScheduler,
    state_history: Vec<VmStateEntry>,
}

impl Vm {
    pub fn new(spec: VmSpec, host_id: u32, created_time: f64) -> Self {
        let scheduler = CloudletScheduler::new(spec.pes, spec.mips_per_pe);
        Self {
            spec,
            host_id,
            status: VmStatus::Starting,
            created_time,
            scheduler,
            state_history: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.spec.id
    }

    /// Fraction of VM cores currently occupied by executing cloudlets.
    pub fn cpu_load(&self) -> f64 {
        self.scheduler.used_pes() as f64 / self.spec.pes as f64
    }

    /// Appends a utilization history point.
    pub fn record_state(&mut self, time: f64) {
        self.state_history.push(VmStateEntry {
            time,
            cpu_load: self.cpu_load(),
            used_pes: self.scheduler.used_pes(),
        });
    }

    pub fn state_history(&self) -> &[VmStateEntry] {
        &self.state_history
    }
}
