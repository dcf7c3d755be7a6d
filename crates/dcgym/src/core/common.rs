//! Common data structures.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Sentinel returned where a VM identifier is expected but no VM is mapped.
pub const NULL_VM_ID: u32 = u32::MAX;

/// Describes a result of checking whether a host can accommodate a VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SuitabilityVerdict {
    Success,
    NotEnoughCores,
    NotEnoughMemory,
    NotEnoughBandwidth,
    NotEnoughStorage,
    HostNotFound,
}

impl Display for SuitabilityVerdict {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SuitabilityVerdict::Success => write!(f, "success"),
            SuitabilityVerdict::NotEnoughCores => write!(f, "not enough cores"),
            SuitabilityVerdict::NotEnoughMemory => write!(f, "not enough memory"),
            SuitabilityVerdict::NotEnoughBandwidth => write!(f, "not enough bandwidth"),
            SuitabilityVerdict::NotEnoughStorage => write!(f, "not enough storage"),
            SuitabilityVerdict::HostNotFound => write!(f, "host not found"),
        }
    }
}
