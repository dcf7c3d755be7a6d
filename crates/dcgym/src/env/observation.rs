//! Fixed-width observation assembly.

use serde::Serialize;

use crate::core::broker::Broker;
use crate::core::datacenter::Datacenter;

/// Marker for empty slots of the VM-to-host map.
pub const NO_HOST: i64 = -1;

/// Fixed-width, padded numeric snapshot of the datacenter and queue state.
///
/// Array sizes are fixed at reset (`max_hosts` / `max_potential_vms`), so
/// the snapshot never reallocates between steps and serializes into a stable
/// shape. Numeric paddings are 0; the VM-to-host map pads with
/// [`NO_HOST`].
#[derive(Clone, Debug, Serialize)]
pub struct ObservationState {
    /// Fraction of each host's cores busy with executing cloudlets.
    pub host_cpu_usage: Vec<f64>,
    /// Fraction of each host's RAM reserved by placed VMs.
    pub host_ram_usage: Vec<f64>,
    /// CPU load of each VM slot.
    pub vm_cpu_load: Vec<f64>,
    /// Free cores of each VM slot.
    pub vm_free_pes: Vec<i64>,
    /// Size class of each VM slot: 0 = empty, 1 = S, 2 = M, 3 = L.
    pub vm_type_codes: Vec<i64>,
    /// Host id of each VM slot, [`NO_HOST`] for empty slots.
    pub vm_host_map: Vec<i64>,
    /// Cloudlets in the broker's dispatch queue.
    pub waiting_cloudlets: i64,
    /// Core demand of the next cloudlet to dispatch (0 if none).
    pub next_cloudlet_pes: i64,
    /// Actual number of hosts.
    pub host_count: i64,
    /// Actual number of live VMs.
    pub vm_count: i64,
    /// Flattened encoding of the current host -> VM -> cloudlet topology.
    pub infrastructure_tree: Vec<i64>,
}

impl ObservationState {
    /// Assembles the snapshot from the current datacenter and broker state.
    pub fn capture(datacenter: &Datacenter, broker: &Broker, max_hosts: usize, max_potential_vms: usize) -> Self {
        let mut host_cpu_usage = vec![0.; max_hosts];
        let mut host_ram_usage = vec![0.; max_hosts];
        for (index, host) in datacenter.hosts().values().enumerate().take(max_hosts) {
            host_cpu_usage[index] = host.cpu_load();
            host_ram_usage[index] = host.ram_allocated_ratio();
        }

        let mut vm_cpu_load = vec![0.; max_potential_vms];
        let mut vm_free_pes = vec![0; max_potential_vms];
        let mut vm_type_codes = vec![0; max_potential_vms];
        let mut vm_host_map = vec![NO_HOST; max_potential_vms];
        let live_vms = broker.live_vms();
        for (slot, vm_id) in live_vms.iter().enumerate().take(max_potential_vms) {
            if let Some(info) = datacenter.vm_slot_info(*vm_id) {
                vm_cpu_load[slot] = info.cpu_load;
                vm_free_pes[slot] = info.free_pes as i64;
                vm_type_codes[slot] = info.vm_type.code();
                vm_host_map[slot] = info.host_id as i64;
            }
        }

        Self {
            host_cpu_usage,
            host_ram_usage,
            vm_cpu_load,
            vm_free_pes,
            vm_type_codes,
            vm_host_map,
            waiting_cloudlets: broker.wait_queue_len() as i64,
            next_cloudlet_pes: broker.next_cloudlet_pes().unwrap_or(0) as i64,
            host_count: datacenter.host_count() as i64,
            vm_count: live_vms.len() as i64,
            infrastructure_tree: infrastructure_tree(datacenter),
        }
    }
}

/// Encodes the Host -> VM -> Cloudlet topology as
/// `[total_cores, host_count,
///   (host_cores, vm_count,
///     (vm_cores, cloudlet_count, (cloudlet_cores, 0) x cloudlet_count
///   ) x vm_count
/// ) x host_count]`.
pub fn infrastructure_tree(datacenter: &Datacenter) -> Vec<i64> {
    let mut tree = vec![datacenter.total_pes() as i64, datacenter.host_count() as i64];
    for host in datacenter.hosts().values() {
        tree.push(host.pes() as i64);
        tree.push(host.vm_count() as i64);
        for vm in host.vms().values() {
            let cloudlet_pes = vm.scheduler.cloudlet_pes();
            tree.push(vm.spec.pes as i64);
            tree.push(cloudlet_pes.len() as i64);
            for pes in cloudlet_pes {
                tree.push(pes as i64);
                tree.push(0);
            }
        }
    }
    tree
}
