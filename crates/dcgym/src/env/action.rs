//! Agent action decoding.

use serde::{Deserialize, Serialize};

use crate::core::vm::VmType;

/// One agent decision per environment step.
///
/// The external encodings (the four-integer tuple and the single-integer
/// shorthand) are decoded into this sum type up front, so the remaining code
/// never inspects fields that are meaningless for a given action kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Do nothing this step.
    NoOp,
    /// Bind the head of the wait queue to the VM with the given id.
    AssignToVm { vm_id: u32 },
    /// Create a VM of the given type on the given host.
    CreateVm { host_id: u32, vm_type: VmType },
    /// Destroy the VM at the given index of the running-VM list.
    DestroyVm { vm_index: u32 },
}

impl Action {
    /// Decodes the four-integer encoding
    /// `(action_type, target_vm_id, target_host_id, vm_type_index)`.
    ///
    /// Returns `None` for encodings that denote no well-formed action (bad
    /// action type, negative target, out-of-range VM type); the environment
    /// treats those as invalid actions rather than errors.
    pub fn from_tuple(raw: [i64; 4]) -> Option<Self> {
        let [action_type, target_vm, target_host, vm_type_index] = raw;
        match action_type {
            0 => Some(Action::NoOp),
            1 => u32::try_from(target_vm).ok().map(|vm_id| Action::AssignToVm { vm_id }),
            2 => {
                let host_id = u32::try_from(target_host).ok()?;
                let vm_type = VmType::from_index(vm_type_index)?;
                Some(Action::CreateVm { host_id, vm_type })
            }
            3 => u32::try_from(target_vm).ok().map(|vm_index| Action::DestroyVm { vm_index }),
            _ => None,
        }
    }

    /// Decodes the single-integer shorthand used by policies that do not
    /// manage the fleet: a VM id, or −1 for no-op.
    pub fn from_scalar(raw: i64) -> Self {
        match u32::try_from(raw) {
            Ok(vm_id) => Action::AssignToVm { vm_id },
            Err(_) => Action::NoOp,
        }
    }
}
