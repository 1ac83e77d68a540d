// ABOUTME: Error types for container gateway operations
// ABOUTME: Distinguishes missing containers/files, failed remote commands, transport errors and timeouts

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Docker/container runtime transport errors
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Could not reach the node's container runtime at all
    #[error("Connection error: {0}")]
    Connection(String),

    /// No container with the configured name exists on the node
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Container was started but never reported running
    #[error("Container {name} not running {waited:?} after start")]
    ContainerNotReady { name: String, waited: Duration },

    /// Requested path is missing inside the container
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A remote command exited with a non-zero status
    #[error("Remote command `{command}` failed with exit code {exit_code}: {message}")]
    RemoteCommandFailure {
        command: String,
        exit_code: i64,
        message: String,
    },

    /// A remote call did not finish within the configured bound
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Path cannot be used for the requested operation
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Local staging area I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;
