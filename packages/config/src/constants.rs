// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across runbox

// Storage
pub const RUNBOX_DATABASE_PATH: &str = "RUNBOX_DATABASE_PATH";

// Lifecycle Queue
pub const RUNBOX_QUEUE_NAME: &str = "RUNBOX_QUEUE_NAME";
pub const RUNBOX_QUEUE_POLL_INTERVAL_MS: &str = "RUNBOX_QUEUE_POLL_INTERVAL_MS";
pub const RUNBOX_MAX_INTENT_ATTEMPTS: &str = "RUNBOX_MAX_INTENT_ATTEMPTS";
pub const RUNBOX_RETRY_BACKOFF_MS: &str = "RUNBOX_RETRY_BACKOFF_MS";

// Fleet
pub const RUNBOX_FLEET_TIMEOUT_SECS: &str = "RUNBOX_FLEET_TIMEOUT_SECS";
pub const RUNBOX_STATIC_NODES: &str = "RUNBOX_STATIC_NODES";

// Container Gateway
pub const RUNBOX_CONTAINER_NAME: &str = "RUNBOX_CONTAINER_NAME";
pub const RUNBOX_DOCKER_PORT: &str = "RUNBOX_DOCKER_PORT";
pub const RUNBOX_STAGING_DIR: &str = "RUNBOX_STAGING_DIR";
pub const RUNBOX_COMMAND_TIMEOUT_SECS: &str = "RUNBOX_COMMAND_TIMEOUT_SECS";
pub const RUNBOX_READINESS_TIMEOUT_SECS: &str = "RUNBOX_READINESS_TIMEOUT_SECS";
pub const RUNBOX_READINESS_POLL_MS: &str = "RUNBOX_READINESS_POLL_MS";

// Realtime Bridge
pub const RUNBOX_BRIDGE_HOST: &str = "RUNBOX_BRIDGE_HOST";
pub const RUNBOX_BRIDGE_PORT: &str = "RUNBOX_BRIDGE_PORT";
pub const RUNBOX_ADDRESS_WAIT_SECS: &str = "RUNBOX_ADDRESS_WAIT_SECS";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
