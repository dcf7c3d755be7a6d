use dcgym::core::config::{ConfigError, SimulationConfig, WorkloadMode};

fn write_config(name: &str, content: &str) -> String {
    let path = std::env::temp_dir().join(format!("dcgym-config-{}-{}", std::process::id(), name));
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn absent_parameters_fall_back_to_defaults() {
    let path = write_config(
        "partial.yaml",
        "hosts_count: 2\n\
         host_pes: 8\n\
         workload_mode: SWF\n\
         cloudlet_trace_file: trace.swf\n\
         reward_wait_time_coef: 0.5\n",
    );
    let config = SimulationConfig::from_file(&path).unwrap();
    assert_eq!(config.hosts_count, 2);
    assert_eq!(config.host_pes, 8);
    assert_eq!(config.workload_mode, WorkloadMode::Swf);
    assert_eq!(config.cloudlet_trace_file, "trace.swf");
    assert_eq!(config.reward_wait_time_coef, 0.5);

    let defaults = SimulationConfig::new();
    assert_eq!(config.small_vm_pes, defaults.small_vm_pes);
    assert_eq!(config.simulation_timestep, defaults.simulation_timestep);
    assert_eq!(config.enable_cost_reward, false);
    assert_eq!(config.results_path, None);
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let path = write_config("broken.yaml", "hosts_count: [not a number\n");
    assert!(matches!(
        SimulationConfig::from_file(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn missing_config_file_is_an_io_error() {
    assert!(matches!(
        SimulationConfig::from_file("/no/such/config.yaml"),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn validation_rejects_nonsensical_values() {
    let mut config = SimulationConfig::new();
    config.host_pe_mips = 0.;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = SimulationConfig::new();
    config.min_time_between_events = 2.0; // above the 1 second timestep
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    assert!(SimulationConfig::new().validate().is_ok());
}
