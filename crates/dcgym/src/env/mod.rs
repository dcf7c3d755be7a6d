//! The gym-style control surface: reset, step, close.

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;
use serde::Serialize;
use sugars::{rc, refcell};

use dcgym_core::context::SimulationContext;
use dcgym_core::event::Event;
use dcgym_core::listener::EventListener;
use dcgym_core::{Id, Simulation, EPSILON};

use crate::core::broker::Broker;
use crate::core::common::SuitabilityVerdict;
use crate::core::config::{ConfigError, SimulationConfig};
use crate::core::datacenter::Datacenter;
use crate::core::events::control::KeepAlive;
use crate::core::placement::RoundRobin;
use crate::core::vm::VmSpec;
use crate::env::observation::ObservationState;
use crate::env::results::{CloudletRecord, RunSummary, VmRecord};
use crate::env::reward::{compute_reward, RewardComponents, RewardInputs};
use crate::workload::load_workload;

pub mod action;
pub mod observation;
pub mod results;
pub mod reward;

pub use action::Action;

/// Cap on the number of events processed within one step; hitting it means
/// a runaway event loop, which terminates the episode.
const STEP_ITERATION_BUDGET: u64 = 100_000;

/// Headroom factor of the derived VM observation slot bound.
const VM_SLOT_HEADROOM: f64 = 1.1;

/// Per-step record of everything that happened besides the reward scalar.
#[derive(Clone, Debug, Serialize)]
pub struct StepInfo {
    /// Simulation clock after the step.
    pub clock: f64,
    /// The individual reward components; their sum is the step reward.
    pub reward: RewardComponents,
    pub assignment_success: bool,
    pub create_attempted: bool,
    pub create_success: bool,
    pub destroy_attempted: bool,
    pub destroy_success: bool,
    pub invalid_action_taken: bool,
    /// Host affected by a create/destroy action, -1 if none.
    pub affected_host: i64,
    /// Cores added to the fleet by this action (0 if none).
    pub cores_added: u32,
    /// Cores removed from the fleet by this action (0 if none).
    pub cores_removed: u32,
    /// Flattened host -> VM -> cloudlet topology after the step.
    pub infrastructure_tree: Vec<i64>,
    /// Wait times of the cloudlets that finished during this step.
    pub finished_wait_times: Vec<f64>,
}

impl StepInfo {
    fn idle(clock: f64, infrastructure_tree: Vec<i64>) -> Self {
        Self {
            clock,
            reward: RewardComponents::default(),
            assignment_success: false,
            create_attempted: false,
            create_success: false,
            destroy_attempted: false,
            destroy_success: false,
            invalid_action_taken: false,
            affected_host: -1,
            cores_added: 0,
            cores_removed: 0,
            infrastructure_tree,
            finished_wait_times: Vec::new(),
        }
    }
}

/// The outcome of one `step` call.
pub struct StepResult {
    pub observation: ObservationState,
    pub reward: f64,
    /// All work is done (or the engine gave up); further steps are pointless.
    pub terminated: bool,
    /// The episode hit the configured step cap.
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Default)]
struct ActionOutcome {
    invalid: bool,
    assignment_success: bool,
    create_attempted: bool,
    create_success: bool,
    destroy_attempted: bool,
    destroy_success: bool,
    affected_host: i64,
    cores_added: u32,
    cores_removed: u32,
}

impl ActionOutcome {
    fn new() -> Self {
        Self {
            affected_host: -1,
            ..Self::default()
        }
    }

    fn invalid() -> Self {
        Self {
            invalid: true,
            ..Self::new()
        }
    }
}

/// Injects payload-free keep-alive events during the final stretch of an
/// episode, so that the event queue does not run dry while cloudlets are
/// still in flight.
struct KeepAliveListener {
    broker: Rc<RefCell<Broker>>,
    broker_id: Id,
    ctx: SimulationContext,
    period: f64,
}

impl EventListener for KeepAliveListener {
    fn on_event(&mut self, _event: &Event, pending_events: usize) {
        if pending_events <= 1 && self.broker.borrow().has_unfinished() {
            self.ctx.emit(KeepAlive {}, self.broker_id, self.period);
        }
    }
}

struct Episode {
    sim: Simulation,
    datacenter: Rc<RefCell<Datacenter>>,
    broker: Rc<RefCell<Broker>>,
    steps: u32,
    max_potential_vms: usize,
    cumulative_reward: f64,
    engine_failed: bool,
}

/// The datacenter simulation behind a synchronous reset/step/close surface.
///
/// One instance covers many episodes: every [`reset`](Self::reset) builds a
/// fresh deterministic simulation from the configuration and the given seed,
/// and every [`step`](Self::step) applies one agent action, advances the
/// clock by one timestep and reports the post-step state. All exchanged
/// types serialize, so the environment can sit behind any transport.
pub struct DatacenterEnv {
    config: Rc<SimulationConfig>,
    max_hosts: usize,
    episode: Option<Episode>,
}

impl DatacenterEnv {
    /// Validates the configuration and creates the environment.
    ///
    /// No simulation is started until the first `reset`.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let max_hosts = config.hosts_count as usize;
        Ok(Self {
            config: rc!(config),
            max_hosts,
            episode: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Reference to the broker of the current episode.
    ///
    /// Panics if no episode is active.
    pub fn broker(&self) -> Rc<RefCell<Broker>> {
        self.episode.as_ref().expect("no active episode").broker.clone()
    }

    /// Reference to the datacenter of the current episode.
    ///
    /// Panics if no episode is active.
    pub fn datacenter(&self) -> Rc<RefCell<Datacenter>> {
        self.episode.as_ref().expect("no active episode").datacenter.clone()
    }

    /// Terminates any prior run and starts a fresh episode.
    ///
    /// Loads and prepares the workload, builds the datacenter and the
    /// initial VM fleet, registers the keep-alive listener and advances the
    /// clock by one minimal tick so that the initial fleet settles. Returns
    /// the initial observation along with an idle info record.
    pub fn reset(&mut self, seed: u64) -> Result<(ObservationState, StepInfo), ConfigError> {
        self.episode = None;
        let config = self.config.clone();
        let descriptors = load_workload(&config)?;

        let mut sim = Simulation::new(seed);
        sim.set_min_delay(config.min_time_between_events);

        let broker_ctx = sim.create_context("broker");
        let broker_id = broker_ctx.id();
        let datacenter = rc!(refcell!(Datacenter::new(
            Box::new(RoundRobin::new()),
            broker_id,
            sim.create_context("datacenter"),
            config.clone(),
        )));
        sim.add_handler("datacenter", datacenter.clone());

        let broker = rc!(refcell!(Broker::new(datacenter.clone(), broker_ctx)));
        sim.add_handler("broker", broker.clone());
        broker.borrow_mut().load_cloudlets(descriptors);

        {
            use crate::core::vm::VmType::{Large, Medium, Small};
            let mut broker = broker.borrow_mut();
            for (vm_type, count) in [
                (Small, config.initial_s_vm_count),
                (Medium, config.initial_m_vm_count),
                (Large, config.initial_l_vm_count),
            ] {
                for _ in 0..count {
                    let id = broker.issue_vm_id();
                    broker.create_vm(VmSpec::for_type(id, vm_type, &config));
                }
            }
        }

        let driver_ctx = sim.create_context("driver");
        sim.add_listener(rc!(refcell!(KeepAliveListener {
            broker: broker.clone(),
            broker_id,
            ctx: driver_ctx,
            period: config.simulation_timestep,
        })));

        // one settling tick for the initial fleet
        sim.run_until(config.min_time_between_events, STEP_ITERATION_BUDGET);
        broker.borrow_mut().admit_arrivals(sim.time());

        let max_potential_vms = if config.max_potential_vms > 0 {
            config.max_potential_vms as usize
        } else {
            let total_pes = datacenter.borrow().total_pes();
            (VM_SLOT_HEADROOM * total_pes as f64 / config.small_vm_pes as f64).ceil() as usize
        };

        let observation =
            ObservationState::capture(&datacenter.borrow(), &broker.borrow(), self.max_hosts, max_potential_vms);
        let info = StepInfo::idle(sim.time(), observation.infrastructure_tree.clone());
        self.episode = Some(Episode {
            sim,
            datacenter,
            broker,
            steps: 0,
            max_potential_vms,
            cumulative_reward: 0.,
            engine_failed: false,
        });
        Ok((observation, info))
    }

    /// Applies one agent action and advances the simulation by one timestep.
    ///
    /// Panics if called before the first successful `reset`.
    pub fn step(&mut self, action: Action) -> StepResult {
        self.step_decoded(Some(action))
    }

    /// Decodes and applies the four-integer action encoding; undecodable
    /// tuples are absorbed as invalid actions.
    pub fn step_tuple(&mut self, raw: [i64; 4]) -> StepResult {
        self.step_decoded(Action::from_tuple(raw))
    }

    /// Decodes and applies the single-integer action encoding.
    pub fn step_scalar(&mut self, raw: i64) -> StepResult {
        self.step_decoded(Some(Action::from_scalar(raw)))
    }

    fn step_decoded(&mut self, action: Option<Action>) -> StepResult {
        let config = self.config.clone();
        let max_hosts = self.max_hosts;
        let episode = self.episode.as_mut().expect("reset() must be called before step()");

        // admission precedes any dispatch within the step
        let now = episode.sim.time();
        episode.broker.borrow_mut().admit_arrivals(now);

        let outcome = apply_action(&config, episode, action);

        let target = episode.sim.time() + config.simulation_timestep;
        let reached = episode.sim.run_until(target, STEP_ITERATION_BUDGET);
        if reached + EPSILON < target {
            warn!("step could not reach time {:.3}, terminating the episode", target);
            episode.engine_failed = true;
        }
        episode.steps += 1;

        let finished_waits = episode.broker.borrow_mut().drain_finished_waits();
        let components = {
            let datacenter = episode.datacenter.borrow();
            let broker = episode.broker.borrow();
            let running_vm_loads: Vec<f64> = broker
                .running_vms()
                .iter()
                .filter_map(|vm_id| datacenter.vm_slot_info(*vm_id))
                .map(|info| info.cpu_load)
                .collect();
            let arrived = broker.arrived_count();
            let not_yet_running = arrived
                .saturating_sub(datacenter.executing_cloudlet_count())
                .saturating_sub(broker.finished_count());
            compute_reward(
                &config,
                &RewardInputs {
                    finished_waits: &finished_waits,
                    running_vm_loads: &running_vm_loads,
                    not_yet_running,
                    arrived,
                    invalid_action: outcome.invalid,
                    allocated_pes: datacenter.allocated_pes(),
                    total_pes: datacenter.total_pes(),
                },
            )
        };
        let reward = components.total();
        episode.cumulative_reward += reward;

        let observation = ObservationState::capture(
            &episode.datacenter.borrow(),
            &episode.broker.borrow(),
            max_hosts,
            episode.max_potential_vms,
        );
        let terminated = episode.engine_failed || !episode_running(episode);
        let truncated = episode.steps >= config.max_episode_length;
        let info = StepInfo {
            clock: episode.sim.time(),
            reward: components,
            assignment_success: outcome.assignment_success,
            create_attempted: outcome.create_attempted,
            create_success: outcome.create_success,
            destroy_attempted: outcome.destroy_attempted,
            destroy_success: outcome.destroy_success,
            invalid_action_taken: outcome.invalid,
            affected_host: outcome.affected_host,
            cores_added: outcome.cores_added,
            cores_removed: outcome.cores_removed,
            infrastructure_tree: observation.infrastructure_tree.clone(),
            finished_wait_times: finished_waits,
        };
        StepResult {
            observation,
            reward,
            terminated,
            truncated,
            info,
        }
    }

    /// True while there is pending simulation work: at least one queued
    /// event or an unfinished cloudlet.
    pub fn is_running(&self) -> bool {
        match &self.episode {
            Some(episode) => episode_running(episode),
            None => false,
        }
    }

    /// Current simulation time, 0 before the first reset.
    pub fn time(&self) -> f64 {
        self.episode.as_ref().map_or(0., |e| e.sim.time())
    }

    /// Terminates the episode and flushes the result artifacts if a results
    /// path is configured. I/O problems are logged, never raised.
    pub fn close(&mut self) {
        let episode = match self.episode.take() {
            Some(episode) => episode,
            None => return,
        };
        if let Some(dir) = &self.config.results_path {
            let broker = episode.broker.borrow();
            let datacenter = episode.datacenter.borrow();
            let cloudlets: Vec<CloudletRecord> = broker
                .finished()
                .iter()
                .map(|c| {
                    let arrival = broker.original_arrival(c.id).unwrap_or(c.arrival_time);
                    CloudletRecord {
                        id: c.id,
                        arrival_time: arrival,
                        exec_start_time: c.exec_start_time,
                        finish_time: c.finish_time,
                        wait_time: (c.exec_start_time - arrival).max(0.),
                        vm_id: c.vm_id.map_or(-1, |id| id as i64),
                        host_id: c
                            .vm_id
                            .and_then(|vm_id| datacenter.vm_log().get(&vm_id))
                            .map_or(-1, |entry| entry.host_id as i64),
                    }
                })
                .collect();
            let vms: Vec<VmRecord> = broker
                .created_vms()
                .iter()
                .filter_map(|vm_id| broker.vm_spec(*vm_id).map(|spec| (*vm_id, spec.clone())))
                .map(|(vm_id, spec)| {
                    let log_entry = datacenter.vm_log().get(&vm_id);
                    VmRecord {
                        id: vm_id,
                        vm_type: spec.vm_type.to_string(),
                        pes: spec.pes,
                        host_id: log_entry.map_or(-1, |entry| entry.host_id as i64),
                        created_time: log_entry.map_or(-1., |entry| entry.created_time),
                        destroyed_time: log_entry.map_or(-1., |entry| entry.destroyed_time),
                        executed_mi: log_entry.map_or(0., |entry| entry.executed_mi),
                        status: broker
                            .vm_status(vm_id)
                            .map_or_else(|| "retracted".to_string(), |s| s.to_string()),
                    }
                })
                .collect();
            let mean_wait = if cloudlets.is_empty() {
                0.
            } else {
                cloudlets.iter().map(|c| c.wait_time).sum::<f64>() / cloudlets.len() as f64
            };
            let summary = RunSummary {
                steps: episode.steps,
                clock: episode.sim.time(),
                total_cloudlets: broker.total_cloudlets(),
                finished_cloudlets: broker.finished_count(),
                mean_wait_time: mean_wait,
                cumulative_reward: episode.cumulative_reward,
            };
            results::write_results(dir, &cloudlets, &vms, &summary);
        }
    }
}

fn episode_running(episode: &Episode) -> bool {
    episode.sim.pending_event_count() > 0 || episode.broker.borrow().has_unfinished()
}

fn apply_action(config: &SimulationConfig, episode: &mut Episode, action: Option<Action>) -> ActionOutcome {
    let action = match action {
        Some(action) => action,
        None => return ActionOutcome::invalid(),
    };
    let mut outcome = ActionOutcome::new();
    match action {
        Action::NoOp => {
            // ignoring a non-empty queue is flagged as invalid
            outcome.invalid = episode.broker.borrow().wait_queue_len() > 0;
        }
        Action::AssignToVm { vm_id } => match episode.broker.borrow_mut().assign_next_to_vm(vm_id) {
            Ok(()) => outcome.assignment_success = true,
            Err(reason) => {
                log::debug!("assignment rejected: {}", reason);
                outcome.invalid = true;
            }
        },
        Action::CreateVm { host_id, vm_type } => {
            outcome.create_attempted = true;
            let mut spec = VmSpec::for_type(0, vm_type, config);
            let suitable =
                episode.datacenter.borrow().can_accommodate(host_id, &spec) == SuitabilityVerdict::Success;
            if suitable {
                let mut broker = episode.broker.borrow_mut();
                spec.id = broker.issue_vm_id();
                spec.requested_host = Some(host_id);
                outcome.create_success = true;
                outcome.affected_host = host_id as i64;
                outcome.cores_added = spec.pes;
                broker.create_vm(spec);
            } else {
                outcome.invalid = true;
            }
        }
        Action::DestroyVm { vm_index } => {
            outcome.destroy_attempted = true;
            let running = episode.broker.borrow().running_vms();
            match running.get(vm_index as usize) {
                Some(vm_id) => {
                    let mut broker = episode.broker.borrow_mut();
                    outcome.destroy_success = true;
                    outcome.affected_host = episode
                        .datacenter
                        .borrow()
                        .vm_host(*vm_id)
                        .map_or(-1, |h| h as i64);
                    outcome.cores_removed = broker.vm_spec(*vm_id).map_or(0, |spec| spec.pes);
                    broker.request_vm_destruction(*vm_id);
                }
                None => outcome.invalid = true,
            }
        }
    }
    outcome
}
