// ABOUTME: Filesystem and process operations against the named container on one fleet node
// ABOUTME: Starts the container on demand, bounds every remote call, and stages archives locally

use crate::archive::{pack_file, scratch_dir, split_container_path, unpack_file};
use crate::error::{GatewayError, Result};
use crate::listing::parse_long_listing;
use crate::runtime::{ContainerRuntime, ExecResult};
use runbox_core::{default_staging_dir, DirectoryEntry, DEFAULT_CONTAINER_NAME};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interpreter used when the caller does not pick one
pub const DEFAULT_INTERPRETER: &str = "node";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Name of the pre-provisioned container on every node
    pub container_name: String,
    /// Local directory that holds scratch areas for archive transfers
    pub staging_dir: PathBuf,
    pub interpreter: String,
    /// Bound on each individual remote call
    pub command_timeout: Duration,
    /// How long a cold-started container may take to report running
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            staging_dir: default_staging_dir(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            command_timeout: Duration::from_secs(30),
            readiness_timeout: Duration::from_secs(10),
            readiness_poll_interval: Duration::from_millis(200),
        }
    }
}

/// Captured result of running a script; a failing script is still a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl From<ExecResult> for ScriptOutput {
    fn from(result: ExecResult) -> Self {
        Self {
            stdout: result.stdout_lossy(),
            stderr: result.stderr_lossy(),
            exit_code: result.exit_code,
        }
    }
}

pub struct ContainerGateway {
    runtime: Arc<dyn ContainerRuntime>,
    config: GatewayConfig,
}

impl ContainerGateway {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: GatewayConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "{} on container {} timed out after {:?}",
                    operation, self.config.container_name, self.config.command_timeout
                );
                Err(GatewayError::Timeout {
                    operation: operation.to_string(),
                    timeout: self.config.command_timeout,
                })
            }
        }
    }

    /// Resolve the container by name, starting it if it is stopped.
    ///
    /// Returns the container id. Never creates a container.
    pub async fn ensure_running(&self) -> Result<String> {
        let name = &self.config.container_name;
        let container = self
            .bounded("find container", self.runtime.find_container(name))
            .await?
            .ok_or_else(|| GatewayError::ContainerNotFound(name.clone()))?;

        if container.running {
            return Ok(container.id);
        }

        info!("Container {} is stopped, starting it", name);
        self.bounded("start container", self.runtime.start_container(&container.id))
            .await?;
        self.wait_until_ready(&container.id).await?;

        Ok(container.id)
    }

    async fn wait_until_ready(&self, container_id: &str) -> Result<()> {
        let started = Instant::now();

        loop {
            if self
                .bounded("readiness probe", self.runtime.is_running(container_id))
                .await?
            {
                debug!(
                    "Container {} ready after {:?}",
                    self.config.container_name,
                    started.elapsed()
                );
                return Ok(());
            }

            if started.elapsed() >= self.config.readiness_timeout {
                return Err(GatewayError::ContainerNotReady {
                    name: self.config.container_name.clone(),
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(self.config.readiness_poll_interval).await;
        }
    }

    /// Run a command and fail on a non-zero exit code
    async fn run_checked(&self, container_id: &str, command: Vec<String>) -> Result<ExecResult> {
        let display = command.join(" ");
        let result = self
            .bounded(&display, self.runtime.exec(container_id, command))
            .await?;

        if !result.success() {
            return Err(GatewayError::RemoteCommandFailure {
                command: display,
                exit_code: result.exit_code,
                message: result.failure_message(),
            });
        }

        Ok(result)
    }

    pub async fn list_files(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        if path.is_empty() {
            return Err(GatewayError::InvalidPath("empty path".to_string()));
        }

        let id = self.ensure_running().await?;
        let result = self
            .run_checked(&id, vec!["ls".into(), "-la".into(), path.into()])
            .await?;

        Ok(parse_long_listing(&result.stdout_lossy()))
    }

    pub async fn get_file_content(&self, path: &str) -> Result<Vec<u8>> {
        let (_, name) = split_container_path(path)?;
        let id = self.ensure_running().await?;

        let archive = self
            .bounded("download archive", self.runtime.download_archive(&id, path))
            .await?;

        let scratch = scratch_dir(&self.config.staging_dir)?;
        unpack_file(&archive, scratch.path(), &name)
    }

    /// Write `content` to `path`, replacing any existing file of that name
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let (dir, name) = split_container_path(path)?;
        let id = self.ensure_running().await?;

        let archive = {
            let scratch = scratch_dir(&self.config.staging_dir)?;
            pack_file(scratch.path(), &name, content)?
        };

        self.bounded(
            "upload archive",
            self.runtime.upload_archive(&id, &dir, archive),
        )
        .await?;

        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }

    /// Remove a file, or a directory recursively when `path` ends with `/`
    pub async fn delete_entry(&self, path: &str) -> Result<()> {
        if path.trim_end_matches('/').is_empty() {
            return Err(GatewayError::InvalidPath(format!(
                "refusing to delete {:?}",
                path
            )));
        }

        let command: Vec<String> = if path.ends_with('/') {
            vec!["rm".into(), "-rf".into(), path.into()]
        } else {
            vec!["rm".into(), path.into()]
        };

        let id = self.ensure_running().await?;
        self.run_checked(&id, command).await?;
        Ok(())
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(GatewayError::InvalidPath("empty path".to_string()));
        }

        let id = self.ensure_running().await?;
        self.run_checked(&id, vec!["mkdir".into(), "-p".into(), path.into()])
            .await?;
        Ok(())
    }

    /// Run a script with the configured interpreter
    pub async fn execute_script(&self, path: &str, args: &[String]) -> Result<ScriptOutput> {
        let interpreter = self.config.interpreter.clone();
        self.execute_script_with(&interpreter, path, args).await
    }

    /// Run a script with an explicit interpreter.
    ///
    /// Output on stderr and a non-zero exit code are returned, not raised.
    pub async fn execute_script_with(
        &self,
        interpreter: &str,
        path: &str,
        args: &[String],
    ) -> Result<ScriptOutput> {
        if path.is_empty() {
            return Err(GatewayError::InvalidPath("empty script path".to_string()));
        }

        let mut command = vec![interpreter.to_string(), path.to_string()];
        command.extend(args.iter().cloned());

        let id = self.ensure_running().await?;
        let result = self
            .bounded(interpreter, self.runtime.exec(&id, command))
            .await?;

        if !result.success() {
            debug!(
                "Script {} exited with {}: {}",
                path,
                result.exit_code,
                result.stderr_lossy().trim()
            );
        }

        Ok(result.into())
    }
}
