//! Virtual machine placement policies.

use std::collections::BTreeMap;

use crate::core::common::SuitabilityVerdict;
use crate::core::host::Host;
use crate::core::vm::VmSpec;

/// Trait for implementation of VM placement policies.
///
/// The policy is defined as a function of a VM spec and the current host
/// table, which returns the id of the host selected for placement or `None`
/// if no host is suitable. Policies may keep internal state (e.g. a
/// round-robin cursor), hence `&mut self`.
pub trait VmPlacementPolicy {
    fn select_host(&mut self, spec: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32>;
}

////////////////////////////////////////////////////////////////////////////////

/// The default policy of the agent-driven datacenter.
///
/// A VM carrying an explicit host target is placed there if the host is
/// suitable. Untargeted VMs (and targeted ones whose host rejected them)
/// fall back to a round-robin scan over the hosts in ascending id order,
/// skipping unsuitable ones.
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { next: 0 }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl VmPlacementPolicy for RoundRobin {
    fn select_host(&mut self, spec: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        if let Some(target) = spec.requested_host {
            if let Some(host) = hosts.get(&target) {
                if host.can_place(spec) == SuitabilityVerdict::Success {
                    return Some(target);
                }
            }
        }
        let host_ids: Vec<u32> = hosts.keys().cloned().collect();
        for attempt in 0..host_ids.len() {
            let candidate = host_ids[(self.next + attempt) % host_ids.len()];
            if hosts[&candidate].can_place(spec) == SuitabilityVerdict::Success {
                self.next = (self.next + attempt + 1) % host_ids.len();
                return Some(candidate);
            }
        }
        None
    }
}

////////////////////////////////////////////////////////////////////////////////

/// FirstFit policy, which returns the first suitable host.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for FirstFit {
    fn default() -> Self {
        Self::new()
    }
}

impl VmPlacementPolicy for FirstFit {
    fn select_host(&mut self, spec: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        for (id, host) in hosts.iter() {
            if host.can_place(spec) == SuitabilityVerdict::Success {
                return Some(*id);
            }
        }
        None
    }
}
