//! Reader for traces in the Standard Workload Format.

use log::warn;

use crate::core::config::ConfigError;
use crate::workload::{CloudletDescriptor, WorkloadReader};

const MIN_FIELDS: usize = 18;

/// Reader for the Standard Workload Format: whitespace-delimited job
/// records, one per line, `;`-prefixed comment header.
///
/// Failed jobs (status 0) are skipped. The job runtime is converted into an
/// instruction count using the configured reference MIPS rating, and the
/// core demand is the larger of the requested and actually allocated
/// processor counts.
pub struct SwfReader {
    path: String,
    reference_mips: f64,
}

impl SwfReader {
    pub fn new(path: &str, reference_mips: f64) -> Self {
        Self {
            path: path.to_string(),
            reference_mips,
        }
    }
}

impl WorkloadReader for SwfReader {
    fn read(&mut self) -> Result<Vec<CloudletDescriptor>, ConfigError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let mut descriptors = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < MIN_FIELDS {
                warn!("{}:{}: skipping record with {} fields", self.path, line_no + 1, fields.len());
                continue;
            }
            // missing SWF values are encoded as -1
            let status = fields[10].parse::<i64>().unwrap_or(-1);
            if status == 0 {
                continue;
            }
            let job_id = fields[0].parse::<u32>().map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                reason: format!("line {}: bad job id: {}", line_no + 1, e),
            })?;
            let submit_time = fields[1].parse::<f64>().unwrap_or(0.).max(0.);
            let runtime = fields[3].parse::<f64>().unwrap_or(0.);
            let allocated_pes = fields[4].parse::<i64>().unwrap_or(-1);
            let requested_pes = fields[7].parse::<i64>().unwrap_or(-1);
            let pes = requested_pes.max(allocated_pes).max(1) as u32;
            let length = (runtime * self.reference_mips).max(1.);
            descriptors.push(CloudletDescriptor {
                id: job_id,
                arrival_time: submit_time,
                length,
                pes,
                file_size_in: 0,
                file_size_out: 0,
            });
        }
        Ok(descriptors)
    }
}
