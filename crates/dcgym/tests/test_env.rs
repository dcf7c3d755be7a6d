use dcgym::core::cloudlet::CloudletStatus;
use dcgym::core::config::{ConfigError, SimulationConfig};
use dcgym::core::vm::{VmStatus, VmType};
use dcgym::env::{Action, DatacenterEnv, StepResult};

fn write_trace(name: &str, content: &str) -> String {
    let path = std::env::temp_dir().join(format!("dcgym-env-{}-{}", std::process::id(), name));
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn base_config(trace: &str) -> SimulationConfig {
    let mut config = SimulationConfig::new();
    config.hosts_count = 1;
    config.host_pes = 16;
    config.host_pe_mips = 1000.;
    config.small_vm_pes = 2;
    config.initial_s_vm_count = 1;
    config.initial_m_vm_count = 0;
    config.initial_l_vm_count = 0;
    config.vm_startup_delay = 0.;
    config.vm_shutdown_delay = 0.;
    config.simulation_timestep = 1.0;
    config.min_time_between_events = 0.01;
    config.max_episode_length = 200;
    config.cloudlet_trace_file = trace.to_string();
    config
}

fn run_until_terminated(env: &mut DatacenterEnv, bound: usize) -> StepResult {
    for _ in 0..bound {
        let result = env.step(Action::NoOp);
        if result.terminated {
            return result;
        }
    }
    panic!("episode did not terminate within {} steps", bound);
}

#[test]
fn single_cloudlet_runs_to_completion() {
    let trace = write_trace("single.csv", "1,0.0,10000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    let (observation, _info) = env.reset(42).unwrap();
    assert_eq!(observation.waiting_cloudlets, 1);
    assert_eq!(observation.next_cloudlet_pes, 1);
    assert_eq!(observation.vm_count, 1);

    let result = env.step(Action::AssignToVm { vm_id: 0 });
    assert!(result.info.assignment_success);
    assert!(!result.info.invalid_action_taken);
    assert_eq!(result.observation.waiting_cloudlets, 0);
    // one core of the two-core VM is busy
    assert_eq!(result.observation.vm_free_pes[0], 1);

    run_until_terminated(&mut env, 30);
    assert!(env.time() >= 10.);
    let broker = env.broker();
    let broker = broker.borrow();
    assert_eq!(broker.finished_count(), 1);
    let finished = &broker.finished()[0];
    assert_eq!(finished.status, CloudletStatus::Success);
    // the wait never exceeds the minimal event latency
    let wait = finished.exec_start_time - broker.original_arrival(1).unwrap();
    assert!(wait >= 0. && wait < 0.05);
}

#[test]
fn fifo_order_is_preserved_on_one_vm() {
    let trace = write_trace("fifo.csv", "1,0.0,5000,1\n2,0.0,5000,1\n");
    let mut config = base_config(&trace);
    config.small_vm_pes = 1;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(42).unwrap();

    assert!(env.step(Action::AssignToVm { vm_id: 0 }).info.assignment_success);
    let result = env.step(Action::AssignToVm { vm_id: 0 });
    assert!(result.info.assignment_success);
    // the second cloudlet waits inside the VM scheduler
    assert_eq!(env.datacenter().borrow().scheduler_waiting_count(), 1);

    run_until_terminated(&mut env, 30);
    let broker = env.broker();
    let broker = broker.borrow();
    assert_eq!(broker.finished_count(), 2);
    assert_eq!(broker.finished()[0].id, 1);
    assert_eq!(broker.finished()[1].id, 2);
    assert!(broker.finished()[0].finish_time < broker.finished()[1].finish_time);
}

#[test]
fn invalid_vm_id_is_absorbed_and_penalized() {
    let trace = write_trace("badvm.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();

    let result = env.step(Action::AssignToVm { vm_id: 99 });
    assert!(result.info.invalid_action_taken);
    assert!(!result.info.assignment_success);
    assert_eq!(result.info.reward.invalid_action, -1.0);
    assert_eq!(result.observation.waiting_cloudlets, 1);
}

#[test]
fn create_then_assign_after_startup_delay() {
    let trace = write_trace("create.csv", "1,0.0,5000,1\n");
    let mut config = base_config(&trace);
    config.initial_s_vm_count = 0;
    config.vm_startup_delay = 2.0;
    let mut env = DatacenterEnv::new(config).unwrap();
    let (observation, _) = env.reset(42).unwrap();
    assert_eq!(observation.vm_count, 0);

    let result = env.step(Action::CreateVm {
        host_id: 0,
        vm_type: VmType::Small,
    });
    assert!(result.info.create_attempted && result.info.create_success);
    assert_eq!(result.info.affected_host, 0);
    assert_eq!(result.info.cores_added, 2);
    assert_eq!(env.broker().borrow().vm_status(0), Some(VmStatus::Starting));

    env.step(Action::NoOp);
    env.step(Action::NoOp);
    assert_eq!(env.broker().borrow().vm_status(0), Some(VmStatus::Running));
    let result = env.step(Action::AssignToVm { vm_id: 0 });
    assert!(result.info.assignment_success);
}

#[test]
fn create_on_unknown_host_is_invalid() {
    let trace = write_trace("badhost.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    let result = env.step(Action::CreateVm {
        host_id: 7,
        vm_type: VmType::Large,
    });
    assert!(result.info.create_attempted);
    assert!(!result.info.create_success);
    assert!(result.info.invalid_action_taken);
    assert_eq!(result.observation.vm_count, 1); // fleet unchanged
}

#[test]
fn undecodable_action_tuples_are_invalid() {
    let trace = write_trace("tuple.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    // vm_type_index 5 does not decode
    let result = env.step_tuple([2, 0, 0, 5]);
    assert!(result.info.invalid_action_taken);
    // the scalar shorthand: -1 is a no-op on an empty queue
    env.step(Action::AssignToVm { vm_id: 0 });
    let result = env.step_scalar(-1);
    assert!(!result.info.invalid_action_taken);
}

#[test]
fn noop_with_backlog_is_flagged_invalid() {
    let trace = write_trace("backlog.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    let result = env.step(Action::NoOp);
    assert!(result.info.invalid_action_taken);
    assert_eq!(result.info.reward.invalid_action, -1.0);
}

#[test]
fn noop_on_empty_queue_changes_nothing_but_the_clock() {
    let trace = write_trace("noop.csv", "1,300.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    let fleet_before = env.broker().borrow().running_vms();
    let queue_before = env.broker().borrow().wait_queue_len();
    let time_before = env.time();

    let result = env.step(Action::NoOp);
    assert!(!result.info.invalid_action_taken);
    assert_eq!(env.broker().borrow().running_vms(), fleet_before);
    assert_eq!(env.broker().borrow().wait_queue_len(), queue_before);
    assert!((env.time() - time_before - 1.0).abs() < 1e-9);
}

#[test]
fn reward_equals_the_sum_of_its_components() {
    let trace = write_trace("reward.csv", "1,0.0,5000,1\n");
    let mut config = base_config(&trace);
    config.enable_cost_reward = true;
    config.reward_wait_time_coef = 2.0;
    config.reward_unutilization_coef = 3.0;
    config.reward_queue_penalty_coef = 4.0;
    config.reward_invalid_action_coef = 5.0;
    config.reward_cost_coef = 6.0;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(42).unwrap();

    let result = env.step(Action::AssignToVm { vm_id: 99 }); // invalid on purpose
    let r = &result.info.reward;
    let sum = r.wait_time + r.utilization + r.queue + r.invalid_action + r.cost;
    assert!((result.reward - sum).abs() < 1e-12);
    assert_eq!(r.invalid_action, -5.0);
    // one Small VM (2 cores) on a 16-core host
    assert!((r.cost - (-6.0 * 2.0 / 16.0)).abs() < 1e-12);
    // the single idle running VM sits 0.95 below the utilization target
    assert!((r.utilization - (-3.0 * 0.95)).abs() < 1e-12);
    // one arrived cloudlet, none running
    assert!((r.queue - (-4.0)).abs() < 1e-12);
    assert_eq!(r.wait_time, 0.);
}

#[test]
fn cost_component_is_gated_by_configuration() {
    let trace = write_trace("nocost.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    let result = env.step(Action::NoOp);
    assert_eq!(result.info.reward.cost, 0.);
}

#[test]
fn observation_arrays_are_padded_to_fixed_width() {
    let trace = write_trace("padding.csv", "1,0.0,5000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    let (observation, _) = env.reset(42).unwrap();
    // 1.1 x 16 cores / 2 cores per Small VM, rounded up
    let slots = 9;
    assert_eq!(observation.vm_cpu_load.len(), slots);
    assert_eq!(observation.vm_free_pes.len(), slots);
    assert_eq!(observation.vm_type_codes.len(), slots);
    assert_eq!(observation.vm_host_map.len(), slots);
    assert_eq!(observation.host_cpu_usage.len(), 1);
    assert_eq!(observation.host_ram_usage.len(), 1);

    assert_eq!(observation.vm_type_codes[0], 1);
    assert_eq!(observation.vm_host_map[0], 0);
    for slot in 1..slots {
        assert_eq!(observation.vm_type_codes[slot], 0);
        assert_eq!(observation.vm_host_map[slot], -1);
        assert_eq!(observation.vm_free_pes[slot], 0);
    }
}

#[test]
fn infrastructure_tree_encodes_the_topology() {
    let trace = write_trace("tree.csv", "1,0.0,20000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(42).unwrap();
    let result = env.step(Action::AssignToVm { vm_id: 0 });
    // [total_cores, host_count, host_cores, vm_count, vm_cores, cloudlet_count, cloudlet_cores, 0]
    assert_eq!(result.info.infrastructure_tree, vec![16, 1, 16, 1, 2, 1, 1, 0]);
}

#[test]
fn episodes_truncate_at_the_step_cap() {
    let trace = write_trace("truncate.csv", "1,500.0,5000,1\n");
    let mut config = base_config(&trace);
    config.max_episode_length = 3;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(42).unwrap();
    assert!(!env.step(Action::NoOp).truncated);
    assert!(!env.step(Action::NoOp).truncated);
    let result = env.step(Action::NoOp);
    assert!(result.truncated);
    assert!(!result.terminated);
}

#[test]
fn identical_seeds_and_actions_replay_identically() {
    let trace = write_trace("replay.csv", "1,0.0,4000,1\n2,1.0,6000,2\n3,2.5,2000,1\n");
    let actions = [
        Action::CreateVm {
            host_id: 0,
            vm_type: VmType::Medium,
        },
        Action::AssignToVm { vm_id: 0 },
        Action::AssignToVm { vm_id: 1 },
        Action::AssignToVm { vm_id: 1 },
        Action::NoOp,
        Action::NoOp,
        Action::NoOp,
        Action::NoOp,
    ];

    let run = |seed: u64| -> Vec<(f64, f64, Vec<i64>, Vec<f64>)> {
        let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
        env.reset(seed).unwrap();
        actions
            .iter()
            .map(|action| {
                let result = env.step(*action);
                (
                    result.reward,
                    result.info.clock,
                    result.observation.vm_free_pes.clone(),
                    result.observation.host_cpu_usage.clone(),
                )
            })
            .collect()
    };

    assert_eq!(run(7), run(7));
}

#[test]
fn results_are_flushed_on_close() {
    let trace = write_trace("results.csv", "1,0.0,2000,1\n");
    let results_dir = std::env::temp_dir().join(format!("dcgym-results-{}", std::process::id()));
    let mut config = base_config(&trace);
    config.results_path = Some(results_dir.to_string_lossy().into_owned());
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(42).unwrap();
    env.step(Action::AssignToVm { vm_id: 0 });
    run_until_terminated(&mut env, 20);
    env.close();

    assert!(results_dir.join("cloudlets.csv").exists());
    assert!(results_dir.join("vms.csv").exists());
    assert!(results_dir.join("summary.json").exists());
    let summary = std::fs::read_to_string(results_dir.join("summary.json")).unwrap();
    assert!(summary.contains("\"finished_cloudlets\": 1"));
}

#[test]
fn invalid_configuration_fails_fast() {
    let mut config = SimulationConfig::new();
    config.hosts_count = 0;
    assert!(matches!(DatacenterEnv::new(config), Err(ConfigError::Invalid(_))));
}

#[test]
fn missing_trace_file_fails_at_reset() {
    let mut config = SimulationConfig::new();
    config.cloudlet_trace_file = "/no/such/trace.csv".to_string();
    let mut env = DatacenterEnv::new(config).unwrap();
    assert!(matches!(env.reset(1), Err(ConfigError::Io { .. })));
}
