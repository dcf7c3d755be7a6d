//! Reward decomposition.

use serde::Serialize;

use crate::core::config::SimulationConfig;

/// The individual penalties making up the step reward.
///
/// Every component is zero or negative; the reward handed to the agent is
/// exactly their sum, so a learning setup can re-weight or inspect them
/// without re-deriving anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RewardComponents {
    /// Penalty on the mean wait time of cloudlets finished this step.
    pub wait_time: f64,
    /// Penalty on imbalanced or low VM utilization.
    pub utilization: f64,
    /// Penalty on the fraction of arrived cloudlets not yet running.
    pub queue: f64,
    /// Penalty for taking an invalid action.
    pub invalid_action: f64,
    /// Penalty on allocated capacity; zero unless cost accounting is enabled.
    pub cost: f64,
}

impl RewardComponents {
    pub fn total(&self) -> f64 {
        self.wait_time + self.utilization + self.queue + self.invalid_action + self.cost
    }
}

/// Inputs of the reward computation gathered by the driver after the time
/// advancement.
pub struct RewardInputs<'a> {
    /// Wait times of cloudlets finished during this step.
    pub finished_waits: &'a [f64],
    /// CPU loads of the VMs currently in the Running state.
    pub running_vm_loads: &'a [f64],
    /// Arrived cloudlets that are neither executing nor finished.
    pub not_yet_running: usize,
    /// Cloudlets admitted to the wait queue so far.
    pub arrived: usize,
    pub invalid_action: bool,
    /// Cores reserved by placed VMs.
    pub allocated_pes: u32,
    /// Total cores of the datacenter.
    pub total_pes: u32,
}

/// The utilization target: the balance penalty is minimal when the mean VM
/// load sits here.
const TARGET_UTILIZATION: f64 = 0.95;

pub fn compute_reward(config: &SimulationConfig, inputs: &RewardInputs) -> RewardComponents {
    let mut components = RewardComponents::default();

    if !inputs.finished_waits.is_empty() {
        let mean_wait = mean(inputs.finished_waits);
        components.wait_time = -config.reward_wait_time_coef * mean_wait.ln_1p();
    }

    if !inputs.running_vm_loads.is_empty() {
        let mean_load = mean(inputs.running_vm_loads);
        let spread = stddev(inputs.running_vm_loads, mean_load);
        components.utilization =
            -config.reward_unutilization_coef * (spread + (mean_load - TARGET_UTILIZATION).abs());
    }

    if inputs.arrived > 0 {
        components.queue =
            -config.reward_queue_penalty_coef * (inputs.not_yet_running as f64 / inputs.arrived as f64);
    }

    if inputs.invalid_action {
        components.invalid_action = -config.reward_invalid_action_coef;
    }

    if config.enable_cost_reward && inputs.total_pes > 0 {
        components.cost = -config.reward_cost_coef * (inputs.allocated_pes as f64 / inputs.total_pes as f64);
    }

    components
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
