use dcgym::core::broker::DispatchError;
use dcgym::core::cloudlet::CloudletStatus;
use dcgym::core::common::NULL_VM_ID;
use dcgym::core::config::SimulationConfig;
use dcgym::core::vm::VmStatus;
use dcgym::env::{Action, DatacenterEnv};

fn write_trace(name: &str, content: &str) -> String {
    let path = std::env::temp_dir().join(format!("dcgym-broker-{}-{}", std::process::id(), name));
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
    config.cloudlet_trace_file = trace.to_string();
    config
}

#[test]
fn dispatch_rejects_on_empty_queue() {
    let trace = write_trace("future.csv", "1,100.0,1000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();
    let result = env.broker().borrow_mut().assign_next_to_vm(0);
    assert_eq!(result.unwrap_err(), DispatchError::EmptyQueue);
}

#[test]
fn dispatch_rejects_unknown_vm() {
    let trace = write_trace("one.csv", "1,0.0,1000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();
    let result = env.broker().borrow_mut().assign_next_to_vm(42);
    assert_eq!(result.unwrap_err(), DispatchError::UnknownVm(42));
    assert_eq!(env.broker().borrow().wait_queue_len(), 1);
}

#[test]
fn dispatch_rejects_vm_that_is_not_running_yet() {
    let trace = write_trace("starting.csv", "1,0.0,1000,1\n");
    let mut config = base_config(&trace);
    config.vm_startup_delay = 5.0;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(1).unwrap();
    assert_eq!(env.broker().borrow().vm_status(0), Some(VmStatus::Starting));
    let result = env.broker().borrow_mut().assign_next_to_vm(0);
    assert_eq!(result.unwrap_err(), DispatchError::VmNotRunning(0));
}

#[test]
fn dispatch_requeues_head_when_vm_is_unsuitable() {
    let trace = write_trace("wide.csv", "1,0.0,1000,10\n");
    let mut config = base_config(&trace);
    config.split_large_cloudlets = false;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(1).unwrap();
    // cloudlet needs 10 cores, the Small VM has 2
    let result = env.broker().borrow_mut().assign_next_to_vm(0);
    assert_eq!(result.unwrap_err(), DispatchError::Unsuitable(0));
    let broker = env.broker();
    let broker = broker.borrow();
    assert_eq!(broker.wait_queue_len(), 1);
    assert_eq!(broker.wait_queue_head().unwrap().id, 1);
}

#[test]
fn default_vm_mapping_is_disabled() {
    let trace = write_trace("mapping.csv", "1,0.0,1000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();
    assert_eq!(env.broker().borrow().default_vm_mapping(1), NULL_VM_ID);
}

#[test]
fn cloudlet_conservation_holds_across_steps() {
    let trace = write_trace("conserve.csv", "1,0.0,3000,1\n2,0.5,3000,1\n3,2.0,3000,1\n4,50.0,3000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();
    let actions = [
        Action::AssignToVm { vm_id: 0 },
        Action::AssignToVm { vm_id: 0 },
        Action::NoOp,
        Action::AssignToVm { vm_id: 0 },
        Action::NoOp,
        Action::NoOp,
        Action::NoOp,
        Action::NoOp,
    ];
    let mut last_arrived = 0;
    for action in actions {
        env.step(action);
        let broker = env.broker();
        let broker = broker.borrow();
        let datacenter = env.datacenter();
        let datacenter = datacenter.borrow();
        let total = broker.future_arrival_count()
            + broker.wait_queue_len()
            + datacenter.executing_cloudlet_count()
            + datacenter.scheduler_waiting_count()
            + broker.finished_count();
        assert_eq!(total, broker.total_cloudlets());
        // the arrived count never goes backwards
        assert!(broker.arrived_count() >= last_arrived);
        last_arrived = broker.arrived_count();
    }
}

#[test]
fn hosts_are_never_oversubscribed() {
    let trace = write_trace("capacity.csv", "1,500.0,1000,1\n");
    let mut config = base_config(&trace);
    config.initial_s_vm_count = 0;
    let mut env = DatacenterEnv::new(config).unwrap();
    env.reset(1).unwrap();

    // keep creating Large VMs (8 cores) on the single 16-core host until
    // the action becomes invalid
    let mut creations = 0;
    loop {
        let result = env.step(Action::CreateVm {
            host_id: 0,
            vm_type: dcgym::core::vm::VmType::Large,
        });
        if result.info.invalid_action_taken {
            break;
        }
        creations += 1;
        assert!(creations <= 16, "host capacity check never rejected a VM");
    }
    assert_eq!(creations, 2);
    let datacenter = env.datacenter();
    let datacenter = datacenter.borrow();
    assert!(datacenter.allocated_pes() <= datacenter.total_pes());
    assert_eq!(datacenter.allocated_pes(), 16);
}

#[test]
fn destroying_a_vm_requeues_remaining_work() {
    let trace = write_trace("destroy.csv", "1,0.0,10000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();

    let result = env.step(Action::AssignToVm { vm_id: 0 });
    assert!(result.info.assignment_success);
    for _ in 0..4 {
        env.step(Action::NoOp);
    }
    // half of the 10 seconds of work is done by now
    let result = env.step(Action::DestroyVm { vm_index: 0 });
    assert!(result.info.destroy_success);
    assert_eq!(result.info.cores_removed, 2);
    assert_eq!(result.observation.vm_count, 0);

    // the interrupted cloudlet is admitted again on the next step
    env.step(Action::NoOp);
    let broker = env.broker();
    let broker = broker.borrow();
    assert_eq!(broker.wait_queue_len(), 1);
    let cloudlet = broker.wait_queue_head().unwrap();
    assert_eq!(cloudlet.status, CloudletStatus::Waiting);
    assert_eq!(cloudlet.vm_id, None);
    assert_eq!(cloudlet.submission_delay, 0.);
    assert_eq!(cloudlet.finished_length, 0.);
    assert!((cloudlet.length - 5000.).abs() < 1.0);
}

#[test]
fn destroyed_work_is_credited_on_completion() {
    let trace = write_trace("credit.csv", "1,0.0,10000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();

    env.step(Action::AssignToVm { vm_id: 0 });
    for _ in 0..4 {
        env.step(Action::NoOp);
    }
    env.step(Action::DestroyVm { vm_index: 0 });
    env.step(Action::CreateVm {
        host_id: 0,
        vm_type: dcgym::core::vm::VmType::Small,
    });
    let result = env.step(Action::AssignToVm { vm_id: 1 });
    assert!(result.info.assignment_success);

    let mut terminated = false;
    for _ in 0..20 {
        if env.step(Action::NoOp).terminated {
            terminated = true;
            break;
        }
    }
    assert!(terminated);
    let broker = env.broker();
    let broker = broker.borrow();
    assert_eq!(broker.finished_count(), 1);
    let finished = &broker.finished()[0];
    assert_eq!(finished.status, CloudletStatus::Success);
    // the first execution stint was credited: only the remainder ran here
    assert!((finished.length - 5000.).abs() < 1.0);
    assert_eq!(finished.finished_length, finished.length);
}

#[test]
fn idle_vms_are_retained_indefinitely() {
    let trace = write_trace("idle.csv", "1,200.0,1000,1\n");
    let mut env = DatacenterEnv::new(base_config(&trace)).unwrap();
    env.reset(1).unwrap();
    for _ in 0..50 {
        env.step(Action::NoOp);
    }
    assert_eq!(env.broker().borrow().vm_status(0), Some(VmStatus::Running));
    assert_eq!(env.broker().borrow().running_vms(), vec![0]);
}
