use crate::config::{BridgeConfig, ConfigError, WorkerConfig, DEFAULT_BRIDGE_PORT};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

const VARS: &[&str] = &[
    "RUNBOX_DATABASE_PATH",
    "RUNBOX_QUEUE_NAME",
    "RUNBOX_QUEUE_POLL_INTERVAL_MS",
    "RUNBOX_MAX_INTENT_ATTEMPTS",
    "RUNBOX_RETRY_BACKOFF_MS",
    "RUNBOX_FLEET_TIMEOUT_SECS",
    "RUNBOX_STATIC_NODES",
    "RUNBOX_CONTAINER_NAME",
    "RUNBOX_DOCKER_PORT",
    "RUNBOX_STAGING_DIR",
    "RUNBOX_COMMAND_TIMEOUT_SECS",
    "RUNBOX_READINESS_TIMEOUT_SECS",
    "RUNBOX_READINESS_POLL_MS",
    "RUNBOX_BRIDGE_HOST",
    "RUNBOX_BRIDGE_PORT",
    "RUNBOX_ADDRESS_WAIT_SECS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_worker_config_defaults() {
    clear_env();

    let config = WorkerConfig::from_env();

    assert_eq!(config.queue_name, "project");
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.orchestrator.max_attempts, 3);
    assert_eq!(config.orchestrator.retry_backoff, Duration::from_millis(2000));
    assert_eq!(config.orchestrator.fleet_timeout, Duration::from_secs(120));
    assert!(config.static_nodes.is_empty());
    assert!(config.database_path.ends_with("runbox.db"));
}

#[test]
#[serial]
fn test_worker_config_custom() {
    clear_env();
    env::set_var("RUNBOX_DATABASE_PATH", "/var/lib/runbox/state.db");
    env::set_var("RUNBOX_QUEUE_NAME", "staging");
    env::set_var("RUNBOX_MAX_INTENT_ATTEMPTS", "5");
    env::set_var("RUNBOX_RETRY_BACKOFF_MS", "100");
    env::set_var("RUNBOX_STATIC_NODES", "n1=10.0.0.1, n2=10.0.0.2");

    let config = WorkerConfig::from_env();

    assert_eq!(config.database_path, PathBuf::from("/var/lib/runbox/state.db"));
    assert_eq!(config.queue_name, "staging");
    assert_eq!(config.orchestrator.max_attempts, 5);
    assert_eq!(config.orchestrator.retry_backoff, Duration::from_millis(100));
    assert_eq!(config.static_nodes, vec!["n1=10.0.0.1", "n2=10.0.0.2"]);

    clear_env();
}

#[test]
#[serial]
fn test_worker_config_out_of_range_falls_back() {
    clear_env();
    env::set_var("RUNBOX_MAX_INTENT_ATTEMPTS", "0");
    env::set_var("RUNBOX_FLEET_TIMEOUT_SECS", "soon");

    let config = WorkerConfig::from_env();

    assert_eq!(config.orchestrator.max_attempts, 3);
    assert_eq!(config.orchestrator.fleet_timeout, Duration::from_secs(120));

    clear_env();
}

#[test]
#[serial]
fn test_bridge_config_defaults() {
    clear_env();

    let config = BridgeConfig::from_env().unwrap();

    assert_eq!(config.port, DEFAULT_BRIDGE_PORT);
    assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(config.docker_port, 2375);
    assert_eq!(config.settings.address_wait, Duration::from_secs(60));
    assert_eq!(config.settings.gateway.container_name, "node");
    assert_eq!(config.settings.gateway.command_timeout, Duration::from_secs(30));
}

#[test]
#[serial]
fn test_bridge_config_custom() {
    clear_env();
    env::set_var("RUNBOX_BRIDGE_HOST", "0.0.0.0");
    env::set_var("RUNBOX_BRIDGE_PORT", "9000");
    env::set_var("RUNBOX_DOCKER_PORT", "2376");
    env::set_var("RUNBOX_CONTAINER_NAME", "app");
    env::set_var("RUNBOX_STAGING_DIR", "/tmp/stage");
    env::set_var("RUNBOX_READINESS_POLL_MS", "50");

    let config = BridgeConfig::from_env().unwrap();

    assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(config.port, 9000);
    assert_eq!(config.docker_port, 2376);
    assert_eq!(config.settings.gateway.container_name, "app");
    assert_eq!(config.settings.gateway.staging_dir, PathBuf::from("/tmp/stage"));
    assert_eq!(
        config.settings.gateway.readiness_poll_interval,
        Duration::from_millis(50)
    );

    clear_env();
}

#[rstest]
#[case("not-a-number")]
#[case("70000")]
#[case("-1")]
#[serial]
fn test_bridge_config_invalid_port(#[case] port: &str) {
    clear_env();
    env::set_var("RUNBOX_BRIDGE_PORT", port);

    let result = BridgeConfig::from_env();

    assert!(matches!(result.unwrap_err(), ConfigError::InvalidPort(_)));

    clear_env();
}

#[test]
#[serial]
fn test_bridge_config_port_zero() {
    clear_env();
    env::set_var("RUNBOX_BRIDGE_PORT", "0");

    let result = BridgeConfig::from_env();

    assert!(matches!(result.unwrap_err(), ConfigError::PortOutOfRange(0)));

    clear_env();
}

#[test]
#[serial]
fn test_bridge_config_invalid_host() {
    clear_env();
    env::set_var("RUNBOX_BRIDGE_HOST", "localhost:80");

    let result = BridgeConfig::from_env();

    assert!(matches!(result.unwrap_err(), ConfigError::InvalidHost(ref h) if h == "localhost:80"));

    clear_env();
}
