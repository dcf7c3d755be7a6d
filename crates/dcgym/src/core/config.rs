//! Simulation configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration and trace-ingestion failures.
///
/// These are the only errors surfaced to the external caller; everything
/// else (invalid agent actions, placement failures, VM loss) is absorbed by
/// the simulation and reported through the step info record.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter value that makes the simulation impossible to build.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// A trace or configuration file could not be read.
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },
    /// A trace or configuration file could not be parsed.
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Source format of the cloudlet workload trace.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum WorkloadMode {
    /// Standard Workload Format, whitespace-delimited job records.
    #[serde(rename = "SWF")]
    Swf,
    /// `job_id,arrival_time,mi,allocated_cores` records.
    #[serde(rename = "CSV")]
    Csv,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfigRaw {
    /// number of physical hosts in the datacenter
    pub hosts_count: Option<u32>,
    /// number of processing elements per host
    pub host_pes: Option<u32>,
    /// MIPS capacity of each host processing element
    pub host_pe_mips: Option<f64>,
    /// host RAM capacity
    pub host_ram: Option<u64>,
    /// host bandwidth capacity
    pub host_bw: Option<u64>,
    /// host storage capacity
    pub host_storage: Option<u64>,
    /// processing elements of the Small VM type
    pub small_vm_pes: Option<u32>,
    /// RAM of the Small VM type
    pub small_vm_ram: Option<u64>,
    /// bandwidth of the Small VM type
    pub small_vm_bw: Option<u64>,
    /// storage of the Small VM type
    pub small_vm_storage: Option<u64>,
    /// Medium VM resources = multiplier x Small VM resources
    pub medium_vm_multiplier: Option<u32>,
    /// Large VM resources = multiplier x Small VM resources
    pub large_vm_multiplier: Option<u32>,
    /// Small VMs created at reset
    pub initial_s_vm_count: Option<u32>,
    /// Medium VMs created at reset
    pub initial_m_vm_count: Option<u32>,
    /// Large VMs created at reset
    pub initial_l_vm_count: Option<u32>,
    /// trace file format
    pub workload_mode: Option<WorkloadMode>,
    /// path to the cloudlet trace file
    pub cloudlet_trace_file: Option<String>,
    /// reference MIPS used to convert SWF runtimes into instruction counts
    pub workload_reader_mips: Option<f64>,
    /// cap on the number of cloudlets ingested from the trace (0 = no cap)
    pub max_cloudlets_to_create_from_workload_file: Option<u32>,
    /// split cloudlets whose core demand exceeds max_cloudlet_pes
    pub split_large_cloudlets: Option<bool>,
    /// core demand threshold for the splitter
    pub max_cloudlet_pes: Option<u32>,
    /// simulated seconds covered by one environment step
    pub simulation_timestep: Option<f64>,
    /// lower bound on event latency
    pub min_time_between_events: Option<f64>,
    /// VM initialization duration
    pub vm_startup_delay: Option<f64>,
    /// VM deallocation duration
    pub vm_shutdown_delay: Option<f64>,
    /// episode truncation threshold in steps
    pub max_episode_length: Option<u32>,
    /// upper bound for VM observation slots (0 = derive from capacity)
    pub max_potential_vms: Option<u32>,
    /// weight of the wait-time reward penalty
    pub reward_wait_time_coef: Option<f64>,
    /// weight of the utilization-balance reward penalty
    pub reward_unutilization_coef: Option<f64>,
    /// weight of the allocated-capacity reward penalty
    pub reward_cost_coef: Option<f64>,
    /// weight of the queue-backlog reward penalty
    pub reward_queue_penalty_coef: Option<f64>,
    /// weight of the invalid-action reward penalty
    pub reward_invalid_action_coef: Option<f64>,
    /// include the allocated-capacity component in the reward
    pub enable_cost_reward: Option<bool>,
    /// directory for per-cloudlet and per-VM result files written on close
    pub results_path: Option<String>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// number of physical hosts in the datacenter
    pub hosts_count: u32,
    /// number of processing elements per host
    pub host_pes: u32,
    /// MIPS capacity of each host processing element
    pub host_pe_mips: f64,
    /// host RAM capacity
    pub host_ram: u64,
    /// host bandwidth capacity
    pub host_bw: u64,
    /// host storage capacity
    pub host_storage: u64,
    /// processing elements of the Small VM type
    pub small_vm_pes: u32,
    /// RAM of the Small VM type
    pub small_vm_ram: u64,
    /// bandwidth of the Small VM type
    pub small_vm_bw: u64,
    /// storage of the Small VM type
    pub small_vm_storage: u64,
    /// Medium VM resources = multiplier x Small VM resources
    pub medium_vm_multiplier: u32,
    /// Large VM resources = multiplier x Small VM resources
    pub large_vm_multiplier: u32,
    /// Small VMs created at reset
    pub initial_s_vm_count: u32,
    /// Medium VMs created at reset
    pub initial_m_vm_count: u32,
    /// Large VMs created at reset
    pub initial_l_vm_count: u32,
    /// trace file format
    pub workload_mode: WorkloadMode,
    /// path to the cloudlet trace file
    pub cloudlet_trace_file: String,
    /// reference MIPS used to convert SWF runtimes into instruction counts
    pub workload_reader_mips: f64,
    /// cap on the number of cloudlets ingested from the trace (0 = no cap)
    pub max_cloudlets_to_create_from_workload_file: u32,
    /// split cloudlets whose core demand exceeds max_cloudlet_pes
    pub split_large_cloudlets: bool,
    /// core demand threshold for the splitter
    pub max_cloudlet_pes: u32,
    /// simulated seconds covered by one environment step
    pub simulation_timestep: f64,
    /// lower bound on event latency
    pub min_time_between_events: f64,
    /// VM initialization duration
    pub vm_startup_delay: f64,
    /// VM deallocation duration
    pub vm_shutdown_delay: f64,
    /// episode truncation threshold in steps
    pub max_episode_length: u32,
    /// upper bound for VM observation slots (0 = derive from capacity)
    pub max_potential_vms: u32,
    /// weight of the wait-time reward penalty
    pub reward_wait_time_coef: f64,
    /// weight of the utilization-balance reward penalty
    pub reward_unutilization_coef: f64,
    /// weight of the allocated-capacity reward penalty
    pub reward_cost_coef: f64,
    /// weight of the queue-backlog reward penalty
    pub reward_queue_penalty_coef: f64,
    /// weight of the invalid-action reward penalty
    pub reward_invalid_action_coef: f64,
    /// include the allocated-capacity component in the reward
    pub enable_cost_reward: bool,
    /// directory for per-cloudlet and per-VM result files written on close
    pub results_path: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationConfig {
    /// Creates simulation config with default parameter values.
    pub fn new() -> Self {
        Self {
            hosts_count: 4,
            host_pes: 16,
            host_pe_mips: 1000.,
            host_ram: 65536,
            host_bw: 10000,
            host_storage: 1_000_000,
            small_vm_pes: 2,
            small_vm_ram: 4096,
            small_vm_bw: 1000,
            small_vm_storage: 10000,
            medium_vm_multiplier: 2,
            large_vm_multiplier: 4,
            initial_s_vm_count: 1,
            initial_m_vm_count: 0,
            initial_l_vm_count: 0,
            workload_mode: WorkloadMode::Csv,
            cloudlet_trace_file: String::new(),
            workload_reader_mips: 1000.,
            max_cloudlets_to_create_from_workload_file: 0,
            split_large_cloudlets: true,
            max_cloudlet_pes: 8,
            simulation_timestep: 1.0,
            min_time_between_events: 0.01,
            vm_startup_delay: 0.,
            vm_shutdown_delay: 0.,
            max_episode_length: 1000,
            max_potential_vms: 0,
            reward_wait_time_coef: 1.0,
            reward_unutilization_coef: 1.0,
            reward_cost_coef: 1.0,
            reward_queue_penalty_coef: 1.0,
            reward_invalid_action_coef: 1.0,
            enable_cost_reward: false,
            results_path: None,
        }
    }

    /// Creates simulation config by reading parameter values from .yaml file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(file_name).map_err(|e| ConfigError::Io {
            path: file_name.to_string(),
            reason: e.to_string(),
        })?;
        let data: SimulationConfigRaw = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: file_name.to_string(),
            reason: e.to_string(),
        })?;
        let default = SimulationConfig::new();
        Ok(Self {
            hosts_count: data.hosts_count.unwrap_or(default.hosts_count),
            host_pes: data.host_pes.unwrap_or(default.host_pes),
            host_pe_mips: data.host_pe_mips.unwrap_or(default.host_pe_mips),
            host_ram: data.host_ram.unwrap_or(default.host_ram),
            host_bw: data.host_bw.unwrap_or(default.host_bw),
            host_storage: data.host_storage.unwrap_or(default.host_storage),
            small_vm_pes: data.small_vm_pes.unwrap_or(default.small_vm_pes),
            small_vm_ram: data.small_vm_ram.unwrap_or(default.small_vm_ram),
            small_vm_bw: data.small_vm_bw.unwrap_or(default.small_vm_bw),
            small_vm_storage: data.small_vm_storage.unwrap_or(default.small_vm_storage),
            medium_vm_multiplier: data.medium_vm_multiplier.unwrap_or(default.medium_vm_multiplier),
            large_vm_multiplier: data.large_vm_multiplier.unwrap_or(default.large_vm_multiplier),
            initial_s_vm_count: data.initial_s_vm_count.unwrap_or(default.initial_s_vm_count),
            initial_m_vm_count: data.initial_m_vm_count.unwrap_or(default.initial_m_vm_count),
            initial_l_vm_count: data.initial_l_vm_count.unwrap_or(default.initial_l_vm_count),
            workload_mode: data.workload_mode.unwrap_or(default.workload_mode),
            cloudlet_trace_file: data.cloudlet_trace_file.unwrap_or(default.cloudlet_trace_file),
            workload_reader_mips: data.workload_reader_mips.unwrap_or(default.workload_reader_mips),
            max_cloudlets_to_create_from_workload_file: data
                .max_cloudlets_to_create_from_workload_file
                .unwrap_or(default.max_cloudlets_to_create_from_workload_file),
            split_large_cloudlets: data.split_large_cloudlets.unwrap_or(default.split_large_cloudlets),
            max_cloudlet_pes: data.max_cloudlet_pes.unwrap_or(default.max_cloudlet_pes),
            simulation_timestep: data.simulation_timestep.unwrap_or(default.simulation_timestep),
            min_time_between_events: data.min_time_between_events.unwrap_or(default.min_time_between_events),
            vm_startup_delay: data.vm_startup_delay.unwrap_or(default.vm_startup_delay),
            vm_shutdown_delay: data.vm_shutdown_delay.unwrap_or(default.vm_shutdown_delay),
            max_episode_length: data.max_episode_length.unwrap_or(default.max_episode_length),
            max_potential_vms: data.max_potential_vms.unwrap_or(default.max_potential_vms),
            reward_wait_time_coef: data.reward_wait_time_coef.unwrap_or(default.reward_wait_time_coef),
            reward_unutilization_coef: data
                .reward_unutilization_coef
                .unwrap_or(default.reward_unutilization_coef),
            reward_cost_coef: data.reward_cost_coef.unwrap_or(default.reward_cost_coef),
            reward_queue_penalty_coef: data
                .reward_queue_penalty_coef
                .unwrap_or(default.reward_queue_penalty_coef),
            reward_invalid_action_coef: data
                .reward_invalid_action_coef
                .unwrap_or(default.reward_invalid_action_coef),
            enable_cost_reward: data.enable_cost_reward.unwrap_or(default.enable_cost_reward),
            results_path: data.results_path,
        })
    }

    /// Checks that the parameter values allow building a simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts_count == 0 {
            return Err(ConfigError::Invalid("hosts_count must be positive".to_string()));
        }
        if self.host_pes == 0 || self.small_vm_pes == 0 {
            return Err(ConfigError::Invalid(
                "host_pes and small_vm_pes must be positive".to_string(),
            ));
        }
        if self.host_pe_mips <= 0. {
            return Err(ConfigError::Invalid("host_pe_mips must be positive".to_string()));
        }
        if self.workload_reader_mips <= 0. {
            return Err(ConfigError::Invalid(
                "workload_reader_mips must be positive".to_string(),
            ));
        }
        if self.medium_vm_multiplier == 0 || self.large_vm_multiplier == 0 {
            return Err(ConfigError::Invalid("VM type multipliers must be positive".to_string()));
        }
        if self.simulation_timestep <= 0. {
            return Err(ConfigError::Invalid("simulation_timestep must be positive".to_string()));
        }
        if self.min_time_between_events <= 0. {
            return Err(ConfigError::Invalid(
                "min_time_between_events must be positive".to_string(),
            ));
        }
        if self.min_time_between_events >= self.simulation_timestep {
            return Err(ConfigError::Invalid(
                "min_time_between_events must be below simulation_timestep".to_string(),
            ));
        }
        if self.vm_startup_delay < 0. || self.vm_shutdown_delay < 0. {
            return Err(ConfigError::Invalid("VM lifecycle delays must be non-negative".to_string()));
        }
        if self.split_large_cloudlets && self.max_cloudlet_pes == 0 {
            return Err(ConfigError::Invalid("max_cloudlet_pes must be positive".to_string()));
        }
        Ok(())
    }
}
