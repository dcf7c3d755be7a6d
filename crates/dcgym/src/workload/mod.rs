//! Workload ingestion: trace readers and the oversize-cloudlet splitter.

use serde::Serialize;

use crate::core::config::{ConfigError, SimulationConfig, WorkloadMode};
use crate::workload::csv_reader::CsvReader;
use crate::workload::splitter::split_oversize;
use crate::workload::swf_reader::SwfReader;

pub mod csv_reader;
pub mod splitter;
pub mod swf_reader;

/// A cloudlet as described by the workload trace, before it enters the
/// simulation.
#[derive(Clone, Debug, Serialize)]
pub struct CloudletDescriptor {
    pub id: u32,
    pub arrival_time: f64,
    /// Work in million instructions.
    pub length: f64,
    pub pes: u32,
    pub file_size_in: u64,
    pub file_size_out: u64,
}

/// Trait for trace-format readers producing cloudlet descriptors.
pub trait WorkloadReader {
    fn read(&mut self) -> Result<Vec<CloudletDescriptor>, ConfigError>;
}

/// Reads the configured trace file and prepares the cloudlet descriptors:
/// picks the reader by workload mode, applies the ingestion cap and
/// optionally splits cloudlets too wide for the configured core limit.
pub fn load_workload(config: &SimulationConfig) -> Result<Vec<CloudletDescriptor>, ConfigError> {
    let mut reader: Box<dyn WorkloadReader> = match config.workload_mode {
        WorkloadMode::Swf => Box::new(SwfReader::new(&config.cloudlet_trace_file, config.workload_reader_mips)),
        WorkloadMode::Csv => Box::new(CsvReader::new(&config.cloudlet_trace_file)),
    };
    let mut descriptors = reader.read()?;
    let cap = config.max_cloudlets_to_create_from_workload_file;
    if cap > 0 && descriptors.len() > cap as usize {
        descriptors.truncate(cap as usize);
    }
    if config.split_large_cloudlets {
        descriptors = split_oversize(descriptors, config.max_cloudlet_pes);
    }
    Ok(descriptors)
}
