//! Per-run result artifacts written on close.

use std::fs;
use std::fs::File;
use std::path::Path;

use log::error;
use serde::Serialize;

/// Result row of a finished cloudlet.
#[derive(Serialize)]
pub struct CloudletRecord {
    pub id: u32,
    pub arrival_time: f64,
    pub exec_start_time: f64,
    pub finish_time: f64,
    pub wait_time: f64,
    pub vm_id: i64,
    /// Host the finishing VM was placed on, -1 if unknown.
    pub host_id: i64,
}

/// Result row of a VM ever created during the run.
#[derive(Serialize)]
pub struct VmRecord {
    pub id: u32,
    pub vm_type: String,
    pub pes: u32,
    /// Host the VM was placed on, -1 if it never left the Requested state.
    pub host_id: i64,
    /// -1 if the VM was never placed.
    pub created_time: f64,
    /// -1 while the VM is still alive at close time.
    pub destroyed_time: f64,
    /// Million instructions executed by cloudlets on this VM.
    pub executed_mi: f64,
    pub status: String,
}

/// Aggregate numbers of the whole run.
#[derive(Serialize)]
pub struct RunSummary {
    pub steps: u32,
    pub clock: f64,
    pub total_cloudlets: usize,
    pub finished_cloudlets: usize,
    pub mean_wait_time: f64,
    pub cumulative_reward: f64,
}

/// Writes the per-cloudlet and per-VM CSV files and the run summary into
/// `dir`. I/O problems are logged and swallowed; result writing never fails
/// the simulation.
pub fn write_results(dir: &str, cloudlets: &[CloudletRecord], vms: &[VmRecord], summary: &RunSummary) {
    if let Err(e) = try_write(dir, cloudlets, vms, summary) {
        error!("failed to write results to {}: {}", dir, e);
    }
}

fn try_write(
    dir: &str,
    cloudlets: &[CloudletRecord],
    vms: &[VmRecord],
    summary: &RunSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new(dir);
    fs::create_dir_all(dir)?;

    let mut writer = csv::Writer::from_path(dir.join("cloudlets.csv"))?;
    for record in cloudlets {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join("vms.csv"))?;
    for record in vms {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let file = File::create(dir.join("summary.json"))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
