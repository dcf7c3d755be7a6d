//! Broker holding the cloudlet wait queue and performing agent-directed dispatch.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::mem;
use std::rc::Rc;

use thiserror::Error;

use dcgym_core::cast;
use dcgym_core::context::SimulationContext;
use dcgym_core::event::Event;
use dcgym_core::handler::EventHandler;
use dcgym_core::{log_debug, log_warn, Id, EPSILON};

use crate::core::cloudlet::Cloudlet;
use crate::core::common::NULL_VM_ID;
use crate::core::datacenter::Datacenter;
use crate::core::events::cloudlet::{CloudletBounced, CloudletReturned, CloudletSubmit, CloudletsHarvested};
use crate::core::events::control::KeepAlive;
use crate::core::events::vm::{VmCreationFailed, VmCreationRequest, VmDestructionRequest};
use crate::core::vm::{VmSpec, VmStatus};
use crate::workload::CloudletDescriptor;

/// Reasons for rejecting a dispatch request.
///
/// Rejections never abort the simulation; the driver reports them through
/// the step info record and penalizes the agent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The wait queue holds no cloudlet.
    #[error("the wait queue is empty")]
    EmptyQueue,
    /// The target VM id was never issued by this broker.
    #[error("vm {0} is not in the created list")]
    UnknownVm(u32),
    /// The target VM exists but is not in the Running state.
    #[error("vm {0} is not running")]
    VmNotRunning(u32),
    /// The target VM cannot fit the head cloudlet; the cloudlet is returned
    /// to the head of the queue.
    #[error("vm {0} is unsuitable for the head cloudlet")]
    Unsuitable(u32),
}

/// Cloudlet waiting for its arrival time, ordered by (arrival time, admission order).
struct FutureArrival {
    time: f64,
    order: u64,
    cloudlet: Cloudlet,
}

impl Eq for FutureArrival {}

impl PartialEq for FutureArrival {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Ord for FutureArrival {
    fn cmp(&self, other: &Self) -> Ordering {
        // inverted for min-heap behavior of BinaryHeap
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for FutureArrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Coordinator between the workload, the agent and the datacenter.
///
/// The broker owns every cloudlet that is not currently executing: cloudlets
/// wait in the future-arrival queue until their arrival time, move to the
/// FIFO dispatch queue upon admission, and are handed to the datacenter only
/// on an explicit agent instruction. There is deliberately no default
/// cloudlet-to-VM mapping. When a VM is destroyed, its interrupted cloudlets
/// come back and are re-queued with their remaining work.
pub struct Broker {
    future_arrivals: BinaryHeap<FutureArrival>,
    arrival_seq: u64,
    wait_queue: VecDeque<Cloudlet>,
    /// Original arrival time of every cloudlet, fixed at load time.
    arrival_map: HashMap<u32, f64>,
    arrived_ids: HashSet<u32>,

    vm_specs: HashMap<u32, VmSpec>,
    created_vms: Vec<u32>,
    next_vm_id: u32,

    submitted: Vec<u32>,
    finished: Vec<Cloudlet>,
    finished_waits: Vec<f64>,
    total_cloudlets: usize,

    datacenter: Rc<RefCell<Datacenter>>,
    datacenter_id: Id,
    ctx: SimulationContext,
}

impl Broker {
    pub fn new(datacenter: Rc<RefCell<Datacenter>>, ctx: SimulationContext) -> Self {
        let datacenter_id = datacenter.borrow().id();
        Self {
            future_arrivals: BinaryHeap::new(),
            arrival_seq: 0,
            wait_queue: VecDeque::new(),
            arrival_map: HashMap::new(),
            arrived_ids: HashSet::new(),
            vm_specs: HashMap::new(),
            created_vms: Vec::new(),
            next_vm_id: 0,
            submitted: Vec::new(),
            finished: Vec::new(),
            finished_waits: Vec::new(),
            total_cloudlets: 0,
            datacenter,
            datacenter_id,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    // WORKLOAD ////////////////////////////////////////////////////////////////

    /// Loads the cloudlet descriptors produced by the workload pipeline.
    ///
    /// The arrival map is established here and never changes afterwards.
    pub fn load_cloudlets(&mut self, descriptors: Vec<CloudletDescriptor>) {
        for d in descriptors {
            let cloudlet = Cloudlet::new(d.id, d.pes, d.length, d.file_size_in, d.file_size_out, d.arrival_time);
            self.arrival_map.insert(d.id, d.arrival_time);
            self.enqueue_future(d.arrival_time, cloudlet);
            self.total_cloudlets += 1;
        }
    }

    fn enqueue_future(&mut self, time: f64, cloudlet: Cloudlet) {
        self.future_arrivals.push(FutureArrival {
            time,
            order: self.arrival_seq,
            cloudlet,
        });
        self.arrival_seq += 1;
    }

    /// Moves every cloudlet whose arrival time has come into the wait queue,
    /// in arrival-time order. Returns the number of admitted cloudlets.
    pub fn admit_arrivals(&mut self, time: f64) -> usize {
        let mut admitted = 0;
        while let Some(head) = self.future_arrivals.peek() {
            if head.time > time + EPSILON {
                break;
            }
            let mut entry = self.future_arrivals.pop().unwrap();
            entry.cloudlet.wait_start_time = time;
            self.arrived_ids.insert(entry.cloudlet.id);
            self.wait_queue.push_back(entry.cloudlet);
            admitted += 1;
        }
        admitted
    }

    // FLEET ///////////////////////////////////////////////////////////////////

    /// Issues the next VM id; ids are unique and monotonically increasing
    /// within one simulation.
    pub fn issue_vm_id(&mut self) -> u32 {
        let id = self.next_vm_id;
        self.next_vm_id += 1;
        id
    }

    /// Registers the VM and requests its placement from the datacenter.
    pub fn create_vm(&mut self, spec: VmSpec) {
        self.created_vms.push(spec.id);
        self.vm_specs.insert(spec.id, spec.clone());
        self.ctx.emit_now(VmCreationRequest { spec }, self.datacenter_id);
    }

    /// Requests the destruction of the VM from the datacenter.
    ///
    /// Idle VMs are retained forever; this request is the only way a VM ends
    /// its life, so fleet size is entirely in the hands of the agent.
    pub fn request_vm_destruction(&mut self, vm_id: u32) {
        self.ctx.emit_now(VmDestructionRequest { vm_id }, self.datacenter_id);
    }

    pub fn vm_spec(&self, vm_id: u32) -> Option<&VmSpec> {
        self.vm_specs.get(&vm_id)
    }

    /// Ids of all VMs ever created, in creation order.
    pub fn created_vms(&self) -> &[u32] {
        &self.created_vms
    }

    /// Current status of a created VM, as reflected by the datacenter.
    ///
    /// A VM the datacenter has not instantiated yet is `Requested`; one
    /// that was placed and has since been removed is `Destroyed`.
    pub fn vm_status(&self, vm_id: u32) -> Option<VmStatus> {
        if !self.vm_specs.contains_key(&vm_id) {
            return None;
        }
        let datacenter = self.datacenter.borrow();
        Some(match datacenter.vm_status(vm_id) {
            Some(status) => status,
            None if datacenter.vm_was_placed(vm_id) => VmStatus::Destroyed,
            None => VmStatus::Requested,
        })
    }

    /// Ids of the created VMs that are still present in the datacenter, in
    /// creation order.
    pub fn live_vms(&self) -> Vec<u32> {
        let datacenter = self.datacenter.borrow();
        self.created_vms
            .iter()
            .filter(|id| datacenter.vm_status(**id).is_some())
            .cloned()
            .collect()
    }

    /// Ids of the created VMs currently in the Running state, in creation
    /// order. Destruction actions index into this list.
    pub fn running_vms(&self) -> Vec<u32> {
        let datacenter = self.datacenter.borrow();
        self.created_vms
            .iter()
            .filter(|id| datacenter.vm_status(**id) == Some(VmStatus::Running))
            .cloned()
            .collect()
    }

    // DISPATCH ////////////////////////////////////////////////////////////////

    pub fn wait_queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Core demand of the cloudlet at the head of the wait queue.
    pub fn next_cloudlet_pes(&self) -> Option<u32> {
        self.wait_queue.front().map(|c| c.pes)
    }

    /// The cloudlet at the head of the wait queue.
    pub fn wait_queue_head(&self) -> Option<&Cloudlet> {
        self.wait_queue.front()
    }

    /// Removes the head of the wait queue and binds it to the named VM.
    ///
    /// On success the cloudlet's submission delay is recomputed and a
    /// submission event is emitted towards the datacenter. On
    /// [`DispatchError::Unsuitable`] the cloudlet is returned to the head of
    /// the queue; all rejections leave the queue otherwise untouched.
    pub fn assign_next_to_vm(&mut self, vm_id: u32) -> Result<(), DispatchError> {
        if self.wait_queue.is_empty() {
            return Err(DispatchError::EmptyQueue);
        }
        let status = self.vm_status(vm_id).ok_or(DispatchError::UnknownVm(vm_id))?;
        if status != VmStatus::Running {
            return Err(DispatchError::VmNotRunning(vm_id));
        }
        let spec = &self.vm_specs[&vm_id];
        let mut cloudlet = self.wait_queue.pop_front().unwrap();
        let fits = cloudlet.pes <= spec.pes && cloudlet.file_size_in + cloudlet.file_size_out <= spec.storage;
        if !fits {
            self.wait_queue.push_front(cloudlet);
            return Err(DispatchError::Unsuitable(vm_id));
        }
        let time = self.ctx.time();
        cloudlet.submission_delay = (cloudlet.arrival_time - time).max(0.);
        cloudlet.vm_id = Some(vm_id);
        self.submitted.push(cloudlet.id);
        log_debug!(self.ctx, "cloudlet {} dispatched to vm {}", cloudlet.id, vm_id);
        let delay = cloudlet.submission_delay;
        self.ctx.emit(CloudletSubmit { cloudlet }, self.datacenter_id, delay);
        Ok(())
    }

    /// Default cloudlet-to-VM mapping, which is disabled in this broker:
    /// dispatch is always externally driven, so this always returns the
    /// null-VM sentinel.
    pub fn default_vm_mapping(&self, cloudlet_id: u32) -> u32 {
        log_warn!(
            self.ctx,
            "default mapping requested for cloudlet {}, dispatch is agent-driven",
            cloudlet_id
        );
        NULL_VM_ID
    }

    // ACCOUNTING //////////////////////////////////////////////////////////////

    pub fn total_cloudlets(&self) -> usize {
        self.total_cloudlets
    }

    /// Number of distinct cloudlets admitted to the wait queue so far.
    pub fn arrived_count(&self) -> usize {
        self.arrived_ids.len()
    }

    pub fn future_arrival_count(&self) -> usize {
        self.future_arrivals.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn finished(&self) -> &[Cloudlet] {
        &self.finished
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    /// Arrival time recorded for the cloudlet when the workload was loaded.
    pub fn original_arrival(&self, cloudlet_id: u32) -> Option<f64> {
        self.arrival_map.get(&cloudlet_id).copied()
    }

    /// True while any loaded cloudlet has not finished yet.
    pub fn has_unfinished(&self) -> bool {
        self.finished.len() < self.total_cloudlets
    }

    /// Takes the wait times of cloudlets finished since the previous call.
    pub fn drain_finished_waits(&mut self) -> Vec<f64> {
        mem::take(&mut self.finished_waits)
    }

    // EVENTS //////////////////////////////////////////////////////////////////

    fn on_cloudlet_returned(&mut self, cloudlet: Cloudlet) {
        let arrival = self.arrival_map.get(&cloudlet.id).copied().unwrap_or(0.);
        let wait = (cloudlet.exec_start_time - arrival).max(0.);
        self.finished_waits.push(wait);
        log_debug!(
            self.ctx,
            "cloudlet {} finished, waited {:.3} before execution",
            cloudlet.id,
            wait
        );
        self.finished.push(cloudlet);
    }

    fn on_cloudlet_bounced(&mut self, mut cloudlet: Cloudlet) {
        let time = self.ctx.time();
        log_debug!(self.ctx, "cloudlet {} bounced back, re-queueing", cloudlet.id);
        cloudlet.reset_for_requeue(time);
        self.enqueue_future(time, cloudlet);
    }

    fn on_cloudlets_harvested(&mut self, vm_id: u32, cloudlets: Vec<Cloudlet>) {
        let time = self.ctx.time();
        log_debug!(
            self.ctx,
            "re-queueing {} cloudlets harvested from vm {}",
            cloudlets.len(),
            vm_id
        );
        for mut cloudlet in cloudlets {
            cloudlet.reset_for_requeue(time);
            self.enqueue_future(time, cloudlet);
        }
    }

    fn on_vm_creation_failed(&mut self, vm_id: u32) {
        log_warn!(self.ctx, "vm {} was not created, retracting it", vm_id);
        self.created_vms.retain(|id| *id != vm_id);
        self.vm_specs.remove(&vm_id);
    }
}

impl EventHandler for Broker {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            CloudletReturned { cloudlet } => {
                self.on_cloudlet_returned(cloudlet);
            }
            CloudletBounced { cloudlet } => {
                self.on_cloudlet_bounced(cloudlet);
            }
            CloudletsHarvested { vm_id, cloudlets } => {
                self.on_cloudlets_harvested(vm_id, cloudlets);
            }
            VmCreationFailed { vm_id } => {
                self.on_vm_creation_failed(vm_id);
            }
            KeepAlive {} => {
                // liveness tick, nothing to do
            }
        })
    }
}
