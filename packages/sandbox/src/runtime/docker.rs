// ABOUTME: Docker implementation of the container runtime capability
// ABOUTME: Uses bollard to reach the Docker API of a fleet node over TCP, or the local daemon

use super::{ContainerRuntime, ContainerSummary, ExecResult, RuntimeConnector};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use bollard::{
    container::{
        DownloadFromContainerOptions, ListContainersOptions, LogOutput, StartContainerOptions,
        UploadToContainerOptions,
    },
    errors::Error as BollardError,
    exec::{CreateExecOptions, StartExecResults},
    models::ContainerSummary as DockerContainer,
    Docker, API_DEFAULT_VERSION,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Node address that selects the local Docker daemon instead of a remote node
pub const LOCAL_ADDRESS: &str = "local";

/// Default port fleet nodes expose their Docker API on
pub const DEFAULT_DOCKER_PORT: u16 = 2375;

pub struct DockerRuntime {
    client: Docker,
    endpoint: String,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon using the platform default socket
    pub fn connect_local() -> Result<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: LOCAL_ADDRESS.to_string(),
        })
    }

    /// Connect to the Docker API of a fleet node
    pub fn connect_remote(address: &str, port: u16, timeout_secs: u64) -> Result<Self> {
        let endpoint = format!("tcp://{}:{}", address, port);
        let client = Docker::connect_with_http(&endpoint, timeout_secs, API_DEFAULT_VERSION)
            .map_err(|e| GatewayError::Connection(format!("{}: {}", endpoint, e)))?;

        debug!("Connected Docker client to {}", endpoint);
        Ok(Self { client, endpoint })
    }

    /// Create with a specific Docker connection
    pub fn with_client(client: Docker, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_not_found(e: BollardError, not_found: GatewayError) -> GatewayError {
        match e {
            BollardError::DockerResponseServerError {
                status_code: 404, ..
            } => not_found,
            other => GatewayError::Docker(other),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name.to_string()]);

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        let Some(id) = exact_match(&containers, name) else {
            return Ok(None);
        };

        let running = self.is_running(&id).await?;
        Ok(Some(ContainerSummary {
            id,
            name: name.to_string(),
            running,
        }))
    }

    async fn is_running(&self, container_id: &str) -> Result<bool> {
        let inspect = self
            .client
            .inspect_container(container_id, None)
            .await
            .map_err(|e| {
                Self::map_not_found(e, GatewayError::ContainerNotFound(container_id.to_string()))
            })?;

        Ok(inspect
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        info!("Starting container {} on {}", container_id, self.endpoint);

        match self
            .client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(_) => Ok(()),
            // Already started is not an error
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already running", container_id);
                Ok(())
            }
            Err(e) => Err(Self::map_not_found(
                e,
                GatewayError::ContainerNotFound(container_id.to_string()),
            )),
        }
    }

    async fn exec(&self, container_id: &str, command: Vec<String>) -> Result<ExecResult> {
        debug!(
            "Executing command in container {}: {:?}",
            container_id, command
        );

        let exec_config = CreateExecOptions {
            cmd: Some(command),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self.client.create_exec(container_id, exec_config).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        match self.client.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(msg) = output.next().await {
                    match msg? {
                        LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                        LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                        LogOutput::Console { message } => stdout.extend_from_slice(&message),
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(GatewayError::Connection(
                    "Exec was detached unexpectedly".to_string(),
                ))
            }
        }

        let exec_inspect = self.client.inspect_exec(&exec.id).await?;
        let exit_code = match exec_inspect.exit_code {
            Some(code) => code,
            None => {
                warn!("Exec {} finished without an exit code", exec.id);
                -1
            }
        };

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
        })
    }

    async fn download_archive(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}:{} from {}", container_id, path, self.endpoint);

        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut stream = self
            .client
            .download_from_container(container_id, Some(options));

        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk
                .map_err(|e| Self::map_not_found(e, GatewayError::FileNotFound(path.to_string())))?;
            data.extend_from_slice(&bytes);
        }

        Ok(data)
    }

    async fn upload_archive(
        &self,
        container_id: &str,
        dest_dir: &str,
        archive: Vec<u8>,
    ) -> Result<()> {
        debug!(
            "Uploading {} byte archive to {}:{} on {}",
            archive.len(),
            container_id,
            dest_dir,
            self.endpoint
        );

        let options = UploadToContainerOptions {
            path: dest_dir.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container(container_id, Some(options), archive.into())
            .await
            .map_err(|e| Self::map_not_found(e, GatewayError::FileNotFound(dest_dir.to_string())))
    }
}

/// Id of the container named exactly `name`. The daemon's name filter
/// matches substrings, so `node` also lists `node-exporter`.
fn exact_match(containers: &[DockerContainer], name: &str) -> Option<String> {
    let exact = format!("/{}", name);
    containers
        .iter()
        .find(|c| {
            c.names
                .as_ref()
                .is_some_and(|names| names.iter().any(|n| n == &exact))
        })
        .and_then(|c| c.id.clone())
}

/// Opens Docker runtimes on fleet nodes by address
#[derive(Debug, Clone)]
pub struct DockerConnector {
    port: u16,
    timeout_secs: u64,
}

impl DockerConnector {
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }
}

impl Default for DockerConnector {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_PORT, 120)
    }
}

impl RuntimeConnector for DockerConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn ContainerRuntime>> {
        let runtime = if address == LOCAL_ADDRESS {
            DockerRuntime::connect_local()?
        } else {
            DockerRuntime::connect_remote(address, self.port, self.timeout_secs)?
        };
        Ok(Arc::new(runtime))
    }
}
