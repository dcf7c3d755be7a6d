//! Physical machine hosting virtual machines.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::common::SuitabilityVerdict;
use crate::core::vm::{Vm, VmSpec};

/// A point of the host state history.
#[derive(Clone, Debug, Serialize)]
pub struct HostStateEntry {
    pub time: f64,
    /// MIPS demanded by cloudlets executing on the host's VMs.
    pub requested_mips: f64,
    /// MIPS reserved by the VMs placed on the host.
    pub allocated_mips: f64,
    pub active: bool,
}

/// Represents a single physical machine, which possesses a certain amount of
/// resources and runs the VMs placed on it.
///
/// Placement reserves cores, RAM, bandwidth and storage; none of the four
/// dimensions is ever oversubscribed. The host appends a state history point
/// on every placement, removal and utilization change, which is used for
/// post-run analysis.
pub struct Host {
    pub id: u32,
    pes: u32,
    pe_mips: f64,
    ram: u64,
    bandwidth: u64,
    storage: u64,

    pes_allocated: u32,
    ram_allocated: u64,
    bandwidth_allocated: u64,
    storage_allocated: u64,

    vms: BTreeMap<u32, Vm>,
    state_history: Vec<HostStateEntry>,
}

impl Host {
    /// Creates new host with specified capacity.
    pub fn new(id: u32, pes: u32, pe_mips: f64, ram: u64, bandwidth: u64, storage: u64) -> Self {
        Self {
            id,
            pes,
            pe_mips,
            ram,
            bandwidth,
            storage,
            pes_allocated: 0,
            ram_allocated: 0,
            bandwidth_allocated: 0,
            storage_allocated: 0,
            vms: BTreeMap::new(),
            state_history: Vec::new(),
        }
    }

    pub fn pes(&self) -> u32 {
        self.pes
    }

    pub fn pe_mips(&self) -> f64 {
        self.pe_mips
    }

    pub fn total_mips(&self) -> f64 {
        self.pes as f64 * self.pe_mips
    }

    pub fn pes_allocated(&self) -> u32 {
        self.pes_allocated
    }

    /// A host with at least one placed VM is considered active.
    pub fn is_active(&self) -> bool {
        !self.vms.is_empty()
    }

    /// Checks if the incoming VM can be placed on this host.
    pub fn can_place(&self, spec: &VmSpec) -> SuitabilityVerdict {
        if self.pes_allocated + spec.pes > self.pes {
            return SuitabilityVerdict::NotEnoughCores;
        }
        if self.ram_allocated + spec.ram > self.ram {
            return SuitabilityVerdict::NotEnoughMemory;
        }
        if self.bandwidth_allocated + spec.bandwidth > self.bandwidth {
            return SuitabilityVerdict::NotEnoughBandwidth;
        }
        if self.storage_allocated + spec.storage > self.storage {
            return SuitabilityVerdict::NotEnoughStorage;
        }
        SuitabilityVerdict::Success
    }

    /// Places the VM, reserving its resources.
    ///
    /// The caller is expected to check [`can_place`](Self::can_place) first.
    pub fn place(&mut self, vm: Vm, time: f64) {
        self.pes_allocated += vm.spec.pes;
        self.ram_allocated += vm.spec.ram;
        self.bandwidth_allocated += vm.spec.bandwidth;
        self.storage_allocated += vm.spec.storage;
        self.vms.insert(vm.id(), vm);
        self.record_state(time);
    }

    /// Removes the VM and releases its resources.
    pub fn remove(&mut self, vm_id: u32, time: f64) -> Option<Vm> {
        let vm = self.vms.remove(&vm_id)?;
        self.pes_allocated -= vm.spec.pes;
        self.ram_allocated -= vm.spec.ram;
        self.bandwidth_allocated -= vm.spec.bandwidth;
        self.storage_allocated -= vm.spec.storage;
        self.record_state(time);
        Some(vm)
    }

    pub fn vm(&self, vm_id: u32) -> Option<&Vm> {
        self.vms.get(&vm_id)
    }

    pub fn vm_mut(&mut self, vm_id: u32) -> Option<&mut Vm> {
        self.vms.get_mut(&vm_id)
    }

    pub fn vms(&self) -> &BTreeMap<u32, Vm> {
        &self.vms
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// Fraction of host cores reserved by placed VMs.
    pub fn cpu_allocated_ratio(&self) -> f64 {
        self.pes_allocated as f64 / self.pes as f64
    }

    /// Fraction of host RAM reserved by placed VMs.
    pub fn ram_allocated_ratio(&self) -> f64 {
        self.ram_allocated as f64 / self.ram as f64
    }

    /// Fraction of host cores busy with executing cloudlets.
    pub fn cpu_load(&self) -> f64 {
        let busy: u32 = self.vms.values().map(|vm| vm.scheduler.used_pes()).sum();
        busy as f64 / self.pes as f64
    }

    /// MIPS demanded by cloudlets executing on the host's VMs.
    pub fn requested_mips(&self) -> f64 {
        self.vms
            .values()
            .map(|vm| vm.scheduler.used_pes() as f64 * vm.spec.mips_per_pe)
            .sum()
    }

    /// MIPS reserved by the VMs placed on the host.
    pub fn allocated_mips(&self) -> f64 {
        self.vms
            .values()
            .map(|vm| vm.spec.pes as f64 * vm.spec.mips_per_pe)
            .sum()
    }

    /// Appends a state history point.
    pub fn record_state(&mut self, time: f64) {
        self.state_history.push(HostStateEntry {
            time,
            requested_mips: self.requested_mips(),
            allocated_mips: self.allocated_mips(),
            active: self.is_active(),
        });
    }

    pub fn state_history(&self) -> &[HostStateEntry] {
        &self.state_history
    }
}
