use runbox_bridge::BridgeSettings;
use runbox_config::env::{list, non_empty, parse_in_range};
use runbox_config::constants::*;
use runbox_core::{default_database_path, DEFAULT_CONTAINER_NAME, DEFAULT_QUEUE_NAME};
use runbox_orchestrator::OrchestratorConfig;
use runbox_sandbox::{GatewayConfig, DEFAULT_DOCKER_PORT};
use std::env;
use std::net::IpAddr;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BRIDGE_PORT: u16 = 8080;
pub const DEFAULT_BRIDGE_HOST: &str = "127.0.0.1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid bridge host: {0}")]
    InvalidHost(String),
}

fn database_path() -> PathBuf {
    non_empty(RUNBOX_DATABASE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(default_database_path)
}

fn queue_name() -> String {
    non_empty(RUNBOX_QUEUE_NAME).unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string())
}

/// Settings for the queue consumer and the operator tools sharing its database
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_path: PathBuf,
    pub queue_name: String,
    pub poll_interval: Duration,
    pub orchestrator: OrchestratorConfig,
    /// `node-id=address` pairs; empty means no fleet is configured
    pub static_nodes: Vec<String>,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let defaults = OrchestratorConfig::default();

        let max_attempts = parse_in_range(RUNBOX_MAX_INTENT_ATTEMPTS, defaults.max_attempts, 1..=100);
        let retry_backoff_ms = parse_in_range(RUNBOX_RETRY_BACKOFF_MS, 2000u64, 0..=600_000);
        let fleet_timeout_secs = parse_in_range(RUNBOX_FLEET_TIMEOUT_SECS, 120u64, 1..=3600);
        let poll_interval_ms = parse_in_range(RUNBOX_QUEUE_POLL_INTERVAL_MS, 500u64, 10..=60_000);

        WorkerConfig {
            database_path: database_path(),
            queue_name: queue_name(),
            poll_interval: Duration::from_millis(poll_interval_ms),
            orchestrator: OrchestratorConfig {
                max_attempts,
                retry_backoff: Duration::from_millis(retry_backoff_ms),
                fleet_timeout: Duration::from_secs(fleet_timeout_secs),
            },
            static_nodes: list(RUNBOX_STATIC_NODES),
        }
    }
}

/// Settings for the realtime bridge server
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub database_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub docker_port: u16,
    pub docker_timeout_secs: u64,
    pub settings: BridgeSettings,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_str =
            env::var(RUNBOX_BRIDGE_PORT).unwrap_or_else(|_| DEFAULT_BRIDGE_PORT.to_string());
        let port = port_str.trim().parse::<u16>()?;

        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let host_str =
            non_empty(RUNBOX_BRIDGE_HOST).unwrap_or_else(|| DEFAULT_BRIDGE_HOST.to_string());
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_str.clone()))?;

        let command_timeout_secs = parse_in_range(RUNBOX_COMMAND_TIMEOUT_SECS, 30u64, 1..=3600);
        let gateway = GatewayConfig {
            container_name: non_empty(RUNBOX_CONTAINER_NAME)
                .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string()),
            staging_dir: non_empty(RUNBOX_STAGING_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| GatewayConfig::default().staging_dir),
            command_timeout: Duration::from_secs(command_timeout_secs),
            readiness_timeout: Duration::from_secs(parse_in_range(
                RUNBOX_READINESS_TIMEOUT_SECS,
                10u64,
                1..=600,
            )),
            readiness_poll_interval: Duration::from_millis(parse_in_range(
                RUNBOX_READINESS_POLL_MS,
                200u64,
                10..=10_000,
            )),
            ..GatewayConfig::default()
        };

        let defaults = BridgeSettings::default();
        let settings = BridgeSettings {
            address_wait: Duration::from_secs(parse_in_range(
                RUNBOX_ADDRESS_WAIT_SECS,
                defaults.address_wait.as_secs(),
                1..=3600,
            )),
            gateway,
            ..defaults
        };

        Ok(BridgeConfig {
            database_path: database_path(),
            host,
            port,
            docker_port: parse_in_range(RUNBOX_DOCKER_PORT, DEFAULT_DOCKER_PORT, 1..=65535),
            docker_timeout_secs: command_timeout_secs,
            settings,
        })
    }
}
