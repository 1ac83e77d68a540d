// ABOUTME: Container runtime capability the gateway is built on
// ABOUTME: Abstract interface over a node's container API so tests can substitute a fake

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

pub mod docker;

pub use docker::{DockerConnector, DockerRuntime};

/// A container located by name on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub running: bool,
}

/// Execution result from running a command in a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Best available explanation of a failed command: stderr, then stdout,
    /// then the bare exit code.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr_lossy();
        if !stderr.trim().is_empty() {
            return stderr.trim().to_string();
        }
        let stdout = self.stdout_lossy();
        if !stdout.trim().is_empty() {
            return stdout.trim().to_string();
        }
        format!("exit code {}", self.exit_code)
    }
}

/// Remote API of the container runtime on one fleet node
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Resolve a container by name, including stopped ones
    async fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>>;

    /// Whether the container currently reports itself running
    async fn is_running(&self, container_id: &str) -> Result<bool>;

    /// Start a stopped container
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Run a command to completion, capturing both streams and the exit code
    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<ExecResult>;

    /// Fetch `path` from the container as a tar archive
    async fn download_archive(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Extract a tar archive into `dest_dir` inside the container
    async fn upload_archive(&self, container_id: &str, dest_dir: &str, archive: Vec<u8>)
        -> Result<()>;
}

/// Opens a [`ContainerRuntime`] for a node address
pub trait RuntimeConnector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Arc<dyn ContainerRuntime>>;
}
