//! Reader for traces in the `job_id,arrival_time,mi,allocated_cores` format.

use crate::core::config::ConfigError;
use crate::workload::{CloudletDescriptor, WorkloadReader};

/// Reader for CSV traces with columns `job_id,arrival_time,mi,allocated_cores`.
///
/// A header row is skipped if its first field is not numeric. Every field is
/// lower-bounded at its natural minimum (0 for times, 1 for work and cores).
pub struct CsvReader {
    path: String,
}

impl CsvReader {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string() }
    }

    fn parse_error(&self, reason: String) -> ConfigError {
        ConfigError::Parse {
            path: self.path.clone(),
            reason,
        }
    }
}

impl WorkloadReader for CsvReader {
    fn read(&mut self) -> Result<Vec<CloudletDescriptor>, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| ConfigError::Io {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let mut descriptors = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| self.parse_error(e.to_string()))?;
            if index == 0 && record.get(0).map_or(false, |f| f.parse::<f64>().is_err()) {
                continue; // header row
            }
            if record.len() < 4 {
                return Err(self.parse_error(format!("record {}: expected 4 fields, got {}", index + 1, record.len())));
            }
            let id = record[0]
                .parse::<u32>()
                .map_err(|e| self.parse_error(format!("record {}: bad job id: {}", index + 1, e)))?;
            let arrival_time = record[1]
                .parse::<f64>()
                .map_err(|e| self.parse_error(format!("record {}: bad arrival time: {}", index + 1, e)))?
                .max(0.);
            let length = record[2]
                .parse::<f64>()
                .map_err(|e| self.parse_error(format!("record {}: bad length: {}", index + 1, e)))?
                .max(1.);
            let pes = record[3]
                .parse::<i64>()
                .map_err(|e| self.parse_error(format!("record {}: bad core count: {}", index + 1, e)))?
                .max(1) as u32;
            descriptors.push(CloudletDescriptor {
                id,
                arrival_time,
                length,
                pes,
                file_size_in: 0,
                file_size_out: 0,
            });
        }
        Ok(descriptors)
    }
}
