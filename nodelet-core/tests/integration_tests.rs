use nodelet_core::config::CapacityConfig;
use nodelet_core::*;

#[test]
fn test_runtime_kind_round_trip_names() {
    for kind in [RuntimeKind::Process, RuntimeKind::Container, RuntimeKind::K8s] {
        let parsed: RuntimeKind = kind.as_str().parse().unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(format!("{}", kind), kind.as_str());
    }
}

#[test]
fn test_unknown_runtime_rejected() {
    for name in ["", "RUNP", "docker", "k8s"] {
        let err = name.parse::<RuntimeKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }), "{name}");
    }
}

#[test]
fn test_memory_size_from_different_units() {
    let from_bytes = MemorySize::from_bytes(1_073_741_824);
    assert_eq!(from_bytes.as_gb(), 1.0);

    let from_kb = MemorySize::from_kb(1_048_576);
    assert_eq!(from_kb.as_gb(), 1.0);

    let from_mb = MemorySize::from_mb(1024);
    assert_eq!(from_mb.as_gb(), 1.0);

    assert_eq!(MemorySize::from_gb(1).as_bytes(), 1_073_741_824);
}

#[test]
fn test_quantities_match_cgroup_values() {
    // 2 cores at the standard period, 512Mi memory
    let cpu: CpuCores = "2".parse().unwrap();
    assert_eq!(cpu.to_quota(), (200_000, 100_000));

    let memory: MemorySize = "512Mi".parse().unwrap();
    assert_eq!(memory.as_bytes(), 536_870_912);
}

#[test]
fn test_minimal_config_file() {
    let yaml = "namespace: alice\nnodeIP: 192.168.1.20\n";
    let config = AgentConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.namespace, "alice");
    assert_eq!(config.node_ip, "192.168.1.20");
    assert_eq!(config.provider.runtime, "");
    assert!(config.provider.runtime.parse::<RuntimeKind>().is_err());
    assert_eq!(config.capacity, CapacityConfig::default());
}

#[test]
fn test_config_serializes_camel_case() {
    let config = AgentConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();

    assert!(yaml.contains("rootDir"));
    assert!(yaml.contains("nodeIP"));
    assert!(yaml.contains("reservedResources"));
    assert!(yaml.contains("diskPressurePath"));

    let reparsed = AgentConfig::from_yaml(&yaml).unwrap();
    assert_eq!(reparsed, config);
}
