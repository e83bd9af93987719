use super::*;
use crate::container::{NetworkMode, PortKey, RestartPolicyName};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_translate_end_to_end() {
    let spec = RawSpec {
        image: "nginx:latest".to_string(),
        memory: "100m".to_string(),
        restart_policy: "on-failure:3".to_string(),
        networks: strings(&["mynet:172.17.0.5"]),
        expose: strings(&["80-81/tcp"]),
        ..Default::default()
    };

    let config = translate(&spec).unwrap();

    assert_eq!(config.host.resources.memory, 104_857_600);
    assert_eq!(config.host.restart_policy.name, RestartPolicyName::OnFailure);
    assert_eq!(config.host.restart_policy.maximum_retry_count, 3);
    assert_eq!(config.host.network_mode.to_string(), "mynet");
    assert_eq!(config.networking.endpoints["mynet"].ip_address, "172.17.0.5");

    let exposed: Vec<PortKey> = config.container.exposed_ports.iter().copied().collect();
    assert_eq!(exposed, vec![PortKey::tcp(80), PortKey::tcp(81)]);
}

#[test]
fn test_container_network_has_no_endpoint() {
    let spec = RawSpec {
        networks: strings(&["container:abc123"]),
        ..Default::default()
    };

    let config = translate(&spec).unwrap();
    assert_eq!(config.host.network_mode.to_string(), "container:abc123");
    assert!(config.networking.endpoints.is_empty());
}

#[test]
fn test_default_spec_translates() {
    let config = translate(&RawSpec::default()).unwrap();

    assert_eq!(config.host.network_mode, NetworkMode::Bridge);
    assert_eq!(config.host.restart_policy.name, RestartPolicyName::No);
    assert_eq!(config.host.resources.memory, 0);
    assert_eq!(config.host.resources.memory_swappiness, -1);
    assert!(config.container.exposed_ports.is_empty());
}

#[test]
fn test_swappiness_is_preserved_or_rejected() {
    for value in [-1, 0, 1, 60, 100] {
        let spec = RawSpec {
            memory_swappiness: value,
            ..Default::default()
        };
        let config = translate(&spec).unwrap();
        assert_eq!(config.host.resources.memory_swappiness, value);
    }

    for value in [-100, -2, 101, 1000] {
        let spec = RawSpec {
            memory_swappiness: value,
            ..Default::default()
        };
        let err = translate(&spec).unwrap_err();
        assert_eq!(err.field, "memory-swappiness");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn test_overlapping_expose_ranges_collapse() {
    let spec = RawSpec {
        expose: strings(&["8000-8004", "8002-8006/tcp", "8004", "8003/udp"]),
        ports: strings(&["8001:8001"]),
        ..Default::default()
    };

    let config = translate(&spec).unwrap();
    let exposed = &config.container.exposed_ports;

    assert_eq!(exposed.len(), 8);
    assert!(exposed.contains(&"8003/udp".parse().unwrap()));
    assert_eq!(config.host.port_bindings[&PortKey::tcp(8001)][0].host_port, "8001");
}

#[test]
fn test_memory_formats_back_to_same_value() {
    for size in ["512", "100m", "1.5g", "2GiB", "3 KB", "7t"] {
        let spec = RawSpec {
            memory: size.to_string(),
            ..Default::default()
        };
        let bytes = translate(&spec).unwrap().host.resources.memory;
        assert_eq!(units::ram_in_bytes(&units::format_ram(bytes)).unwrap(), bytes, "{}", size);
    }
}

#[test]
fn test_first_error_is_reported() {
    let spec = RawSpec {
        labels: strings(&["broken"]),
        memory: "lots".to_string(),
        ..Default::default()
    };

    let err = translate(&spec).unwrap_err();
    assert_eq!(err.field, "label");
    assert_eq!(err.to_string(), "invalid label \"broken\": expected key=value");
}

#[test]
fn test_each_field_can_fail() {
    let cases: Vec<(&str, RawSpec)> = vec![
        (
            "memory-swap",
            RawSpec {
                memory_swap: "huge".to_string(),
                ..Default::default()
            },
        ),
        (
            "device",
            RawSpec {
                devices: strings(&["/dev/sda:/dev/sdb:rwx"]),
                ..Default::default()
            },
        ),
        (
            "restart",
            RawSpec {
                restart_policy: "on-failure:1:2".to_string(),
                ..Default::default()
            },
        ),
        (
            "oom-score-adj",
            RawSpec {
                oom_score_adj: 1001,
                ..Default::default()
            },
        ),
        (
            "expose",
            RawSpec {
                expose: strings(&["80:80"]),
                ..Default::default()
            },
        ),
        (
            "net",
            RawSpec {
                networks: strings(&[""]),
                ..Default::default()
            },
        ),
        (
            "security-opt",
            RawSpec {
                security_opt: strings(&["label=disable"]),
                ..Default::default()
            },
        ),
        (
            "blkio-weight",
            RawSpec {
                blkio_weight: 5,
                ..Default::default()
            },
        ),
        (
            "disk-quota",
            RawSpec {
                disk_quota: strings(&[""]),
                ..Default::default()
            },
        ),
    ];

    for (field, spec) in cases {
        let err = translate(&spec).unwrap_err();
        assert_eq!(err.field, field);
    }
}

#[test]
fn test_raw_spec_partial_json() {
    let spec: RawSpec = serde_json::from_str(
        r#"{"image": "redis", "entrypoint": "/bin/sh -c", "ports": ["6379"]}"#,
    )
    .unwrap();
    assert_eq!(spec.memory_swappiness, -1);

    let config = translate(&spec).unwrap();
    assert_eq!(config.container.entrypoint, vec!["/bin/sh", "-c"]);
    assert!(config.container.exposed_ports.contains(&PortKey::tcp(6379)));
}
