//! Datacenter component owning the hosts and executing cloudlets.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use dcgym_core::cast;
use dcgym_core::context::SimulationContext;
use dcgym_core::event::Event;
use dcgym_core::handler::EventHandler;
use dcgym_core::{log_debug, log_trace, log_warn, Id};

use crate::core::cloudlet::Cloudlet;
use crate::core::common::SuitabilityVerdict;
use crate::core::config::SimulationConfig;
use crate::core::events::cloudlet::{
    CloudletBounced, CloudletCompletion, CloudletReturned, CloudletSubmit, CloudletsHarvested,
};
use crate::core::events::vm::{VmCreationFailed, VmCreationRequest, VmDestructionRequest, VmStarted, VmStopped};
use crate::core::host::Host;
use crate::core::placement::VmPlacementPolicy;
use crate::core::scheduler::StartedCloudlet;
use crate::core::vm::{Vm, VmSpec, VmStatus, VmType};

/// Snapshot of a single VM used for observation assembly.
pub struct VmSlotInfo {
    pub vm_id: u32,
    pub host_id: u32,
    pub vm_type: VmType,
    pub status: VmStatus,
    pub pes: u32,
    pub free_pes: u32,
    pub cpu_load: f64,
}

/// Permanent record of a VM that was placed at some point of the run.
///
/// Entries survive VM destruction, so post-run reports can attribute work
/// and placement for the whole fleet history.
pub struct VmLogEntry {
    pub host_id: u32,
    pub created_time: f64,
    /// -1 while the VM is still alive.
    pub destroyed_time: f64,
    /// Million instructions executed by cloudlets on this VM.
    pub executed_mi: f64,
}

/// Represents the datacenter: the exclusive owner of all hosts, which in
/// turn own the VMs placed on them.
///
/// The datacenter processes VM creation and destruction requests coming from
/// the broker, runs the VM startup/shutdown lifecycle, accepts dispatched
/// cloudlets into the schedulers of their target VMs, and schedules the
/// exact completion event for every executing cloudlet. When a VM is
/// destroyed, the work of its cloudlets is credited and the interrupted ones
/// are handed back to the broker.
pub struct Datacenter {
    hosts: BTreeMap<u32, Host>,
    vm_location: HashMap<u32, u32>,
    vm_log: HashMap<u32, VmLogEntry>,
    placement: Box<dyn VmPlacementPolicy>,
    broker_id: Id,
    ctx: SimulationContext,
    config: Rc<SimulationConfig>,
}

impl Datacenter {
    /// Creates the datacenter and its hosts from the configuration.
    pub fn new(
        placement: Box<dyn VmPlacementPolicy>,
        broker_id: Id,
        ctx: SimulationContext,
        config: Rc<SimulationConfig>,
    ) -> Self {
        let mut hosts = BTreeMap::new();
        for host_id in 0..config.hosts_count {
            hosts.insert(
                host_id,
                Host::new(
                    host_id,
                    config.host_pes,
                    config.host_pe_mips,
                    config.host_ram,
                    config.host_bw,
                    config.host_storage,
                ),
            );
        }
        Self {
            hosts,
            vm_location: HashMap::new(),
            vm_log: HashMap::new(),
            placement,
            broker_id,
            ctx,
            config,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn hosts(&self) -> &BTreeMap<u32, Host> {
        &self.hosts
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Total number of cores across all hosts.
    pub fn total_pes(&self) -> u32 {
        self.hosts.values().map(|h| h.pes()).sum()
    }

    /// Number of cores reserved by placed VMs across all hosts.
    pub fn allocated_pes(&self) -> u32 {
        self.hosts.values().map(|h| h.pes_allocated()).sum()
    }

    /// Checks if the given host can accommodate a VM with the given spec.
    pub fn can_accommodate(&self, host_id: u32, spec: &VmSpec) -> SuitabilityVerdict {
        match self.hosts.get(&host_id) {
            Some(host) => host.can_place(spec),
            None => SuitabilityVerdict::HostNotFound,
        }
    }

    /// Returns the id of the host running the specified VM.
    pub fn vm_host(&self, vm_id: u32) -> Option<u32> {
        self.vm_location.get(&vm_id).copied()
    }

    /// Returns the current status of the specified VM, or `None` if the VM
    /// is not present in the datacenter (never placed or already destroyed).
    pub fn vm_status(&self, vm_id: u32) -> Option<VmStatus> {
        let host_id = self.vm_location.get(&vm_id)?;
        self.hosts[host_id].vm(vm_id).map(|vm| vm.status)
    }

    /// True if the VM was placed on some host at any point of the run.
    pub fn vm_was_placed(&self, vm_id: u32) -> bool {
        self.vm_log.contains_key(&vm_id)
    }

    /// Placement and work records of every VM ever placed.
    pub fn vm_log(&self) -> &HashMap<u32, VmLogEntry> {
        &self.vm_log
    }

    /// Returns the observation snapshot of the specified VM.
    pub fn vm_slot_info(&self, vm_id: u32) -> Option<VmSlotInfo> {
        let host_id = *self.vm_location.get(&vm_id)?;
        let vm = self.hosts[&host_id].vm(vm_id)?;
        Some(VmSlotInfo {
            vm_id,
            host_id,
            vm_type: vm.spec.vm_type,
            status: vm.status,
            pes: vm.spec.pes,
            free_pes: vm.scheduler.free_pes(),
            cpu_load: vm.cpu_load(),
        })
    }

    /// Number of cloudlets currently executing across the datacenter.
    pub fn executing_cloudlet_count(&self) -> usize {
        self.hosts
            .values()
            .flat_map(|h| h.vms().values())
            .map(|vm| vm.scheduler.executing_count())
            .sum()
    }

    /// Number of cloudlets waiting inside VM schedulers.
    pub fn scheduler_waiting_count(&self) -> usize {
        self.hosts
            .values()
            .flat_map(|h| h.vms().values())
            .map(|vm| vm.scheduler.waiting_count())
            .sum()
    }

    fn on_vm_creation_request(&mut self, mut spec: VmSpec) {
        let vm_id = spec.id;
        match self.placement.select_host(&spec, &self.hosts) {
            Some(host_id) => {
                // targeting is honored (or overridden) exactly once
                spec.requested_host = None;
                let time = self.ctx.time();
                log_debug!(self.ctx, "vm {} ({}) placed on host {}", vm_id, spec.vm_type, host_id);
                let mut vm = Vm::new(spec, host_id, time);
                if self.config.vm_startup_delay > 0. {
                    self.ctx.emit_self(VmStarted { vm_id }, self.config.vm_startup_delay);
                } else {
                    vm.status = VmStatus::Running;
                }
                self.hosts.get_mut(&host_id).unwrap().place(vm, time);
                self.vm_location.insert(vm_id, host_id);
                self.vm_log.insert(
                    vm_id,
                    VmLogEntry {
                        host_id,
                        created_time: time,
                        destroyed_time: -1.,
                        executed_mi: 0.,
                    },
                );
            }
            None => {
                log_debug!(self.ctx, "no suitable host for vm {}", vm_id);
                self.ctx.emit_now(VmCreationFailed { vm_id }, self.broker_id);
            }
        }
    }

    fn on_vm_started(&mut self, vm_id: u32) {
        let host_id = match self.vm_location.get(&vm_id) {
            Some(host_id) => *host_id,
            None => return, // destroyed before startup completed
        };
        let time = self.ctx.time();
        let host = self.hosts.get_mut(&host_id).unwrap();
        if let Some(vm) = host.vm_mut(vm_id) {
            vm.status = VmStatus::Running;
            vm.record_state(time);
            log_debug!(self.ctx, "vm {} started and running on host {}", vm_id, host_id);
        }
    }

    fn on_vm_destruction_request(&mut self, vm_id: u32) {
        let host_id = match self.vm_location.get(&vm_id) {
            Some(host_id) => *host_id,
            None => {
                log_warn!(self.ctx, "destruction request for unknown vm {}", vm_id);
                return;
            }
        };
        let time = self.ctx.time();
        let host = self.hosts.get_mut(&host_id).unwrap();
        let drained = match host.vm_mut(vm_id) {
            Some(vm) => {
                vm.status = VmStatus::ShuttingDown;
                let drained = vm.scheduler.drain(time);
                vm.record_state(time);
                drained
            }
            None => return,
        };
        host.record_state(time);
        log_debug!(
            self.ctx,
            "vm {} shutting down, {} cloudlets interrupted",
            vm_id,
            drained.interrupted.len()
        );
        // the executed part of the drained cloudlets stays attributed to this VM
        let executed: f64 = drained
            .finished
            .iter()
            .chain(drained.interrupted.iter())
            .map(|c| c.finished_length)
            .sum();
        if let Some(entry) = self.vm_log.get_mut(&vm_id) {
            entry.executed_mi += executed;
        }
        for event_id in drained.events_to_cancel {
            self.ctx.cancel_event(event_id);
        }
        for cloudlet in drained.finished {
            self.ctx.emit_now(CloudletReturned { cloudlet }, self.broker_id);
        }
        if !drained.interrupted.is_empty() {
            self.ctx.emit_now(
                CloudletsHarvested {
                    vm_id,
                    cloudlets: drained.interrupted,
                },
                self.broker_id,
            );
        }
        self.ctx.emit_self(VmStopped { vm_id }, self.config.vm_shutdown_delay);
    }

    fn on_vm_stopped(&mut self, vm_id: u32) {
        if let Some(host_id) = self.vm_location.remove(&vm_id) {
            let time = self.ctx.time();
            self.hosts.get_mut(&host_id).unwrap().remove(vm_id, time);
            if let Some(entry) = self.vm_log.get_mut(&vm_id) {
                entry.destroyed_time = time;
            }
            log_debug!(self.ctx, "vm {} deleted from host {}", vm_id, host_id);
        }
    }

    fn on_cloudlet_submit(&mut self, cloudlet: Cloudlet) {
        let vm_id = match cloudlet.vm_id {
            Some(vm_id) => vm_id,
            None => {
                log_warn!(self.ctx, "submitted cloudlet {} is not bound to any vm", cloudlet.id);
                self.ctx.emit_now(CloudletBounced { cloudlet }, self.broker_id);
                return;
            }
        };
        let running = self.vm_status(vm_id) == Some(VmStatus::Running);
        if !running {
            log_debug!(self.ctx, "cloudlet {} bounced, vm {} is not running", cloudlet.id, vm_id);
            self.ctx.emit_now(CloudletBounced { cloudlet }, self.broker_id);
            return;
        }
        let time = self.ctx.time();
        let host_id = self.vm_location[&vm_id];
        let cloudlet_id = cloudlet.id;
        let host = self.hosts.get_mut(&host_id).unwrap();
        let started = host.vm_mut(vm_id).unwrap().scheduler.submit(cloudlet, time);
        match &started {
            Some(_) => log_trace!(self.ctx, "cloudlet {} started on vm {}", cloudlet_id, vm_id),
            None => log_trace!(self.ctx, "cloudlet {} queued on vm {}", cloudlet_id, vm_id),
        }
        if let Some(s) = started {
            self.schedule_completion(vm_id, s);
        }
        self.touch_vm(vm_id, time);
    }

    fn on_cloudlet_completion(&mut self, vm_id: u32, cloudlet_id: u32) {
        let host_id = match self.vm_location.get(&vm_id) {
            Some(host_id) => *host_id,
            None => return, // the VM is gone, its completions were cancelled
        };
        let time = self.ctx.time();
        let host = self.hosts.get_mut(&host_id).unwrap();
        let (finished, started) = match host.vm_mut(vm_id) {
            Some(vm) => vm.scheduler.on_completion(cloudlet_id, time),
            None => return,
        };
        if let Some(cloudlet) = finished {
            log_debug!(self.ctx, "cloudlet {} finished on vm {}", cloudlet.id, vm_id);
            // a cloudlet always enters a VM with zero finished length, so the
            // whole current length ran here
            if let Some(entry) = self.vm_log.get_mut(&vm_id) {
                entry.executed_mi += cloudlet.length;
            }
            self.ctx.emit_now(CloudletReturned { cloudlet }, self.broker_id);
        }
        for s in started {
            self.schedule_completion(vm_id, s);
        }
        self.touch_vm(vm_id, time);
    }

    fn schedule_completion(&mut self, vm_id: u32, started: StartedCloudlet) {
        let event_id = self.ctx.emit_self(
            CloudletCompletion {
                vm_id,
                cloudlet_id: started.cloudlet_id,
            },
            started.eta,
        );
        let host_id = self.vm_location[&vm_id];
        let host = self.hosts.get_mut(&host_id).unwrap();
        if let Some(vm) = host.vm_mut(vm_id) {
            vm.scheduler.set_completion_event(started.cloudlet_id, event_id);
        }
    }

    fn touch_vm(&mut self, vm_id: u32, time: f64) {
        if let Some(host_id) = self.vm_location.get(&vm_id) {
            let host = self.hosts.get_mut(host_id).unwrap();
            if let Some(vm) = host.vm_mut(vm_id) {
                vm.record_state(time);
            }
            host.record_state(time);
        }
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            VmCreationRequest { spec } => {
                self.on_vm_creation_request(spec);
            }
            VmDestructionRequest { vm_id } => {
                self.on_vm_destruction_request(vm_id);
            }
            VmStarted { vm_id } => {
                self.on_vm_started(vm_id);
            }
            VmStopped { vm_id } => {
                self.on_vm_stopped(vm_id);
            }
            CloudletSubmit { cloudlet } => {
                self.on_cloudlet_submit(cloudlet);
            }
            CloudletCompletion { vm_id, cloudlet_id } => {
                self.on_cloudlet_completion(vm_id, cloudlet_id);
            }
        })
    }
}
