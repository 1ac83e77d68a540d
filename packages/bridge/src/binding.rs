// ABOUTME: Binds a new bridge connection to the fleet node serving its project
// ABOUTME: Resolves by project completion event or by an explicitly registered address

use runbox_core::Project;
use runbox_storage::{InstanceRegistry, SqliteCompletionLog, StorageError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Query string of the `/ws` upgrade request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    pub project: Option<String>,
    pub address: Option<String>,
}

/// The node a connection talks to
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub address: String,
    pub project: Option<Project>,
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("Connection must name a project or an address")]
    MissingTarget,

    #[error("No sandbox became available for project {project} within {waited:?}")]
    NoSandbox { project: String, waited: Duration },

    #[error("Address {0} is not a registered fleet node")]
    UnknownAddress(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub async fn resolve(
    params: &ConnectParams,
    completions: &SqliteCompletionLog,
    registry: &dyn InstanceRegistry,
    wait: Duration,
    poll_interval: Duration,
) -> Result<Binding, BindError> {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    if let Some(address) = non_empty(&params.address) {
        if registry.find(&address).await?.is_none() {
            return Err(BindError::UnknownAddress(address));
        }
        return Ok(Binding {
            address,
            project: None,
        });
    }

    let project_id = non_empty(&params.project).ok_or(BindError::MissingTarget)?;
    debug!("Waiting up to {:?} for project {} to come up", wait, project_id);

    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = completions
            .wait_for_project(&project_id, remaining, poll_interval)
            .await?
            .ok_or_else(|| BindError::NoSandbox {
                project: project_id.clone(),
                waited: wait,
            })?;

        if registry.find(&event.ip).await?.is_some() {
            return Ok(Binding {
                address: event.ip,
                project: Some(event.project),
            });
        }

        // A completion from an earlier sandbox may outlive its node; a new
        // one replaces it once the project is brought up again
        if Instant::now() >= deadline {
            return Err(BindError::UnknownAddress(event.ip));
        }
        debug!(
            "Project {} was announced at {} which is no longer registered, still waiting",
            project_id, event.ip
        );
        tokio::time::sleep_until(std::cmp::min(deadline, Instant::now() + poll_interval)).await;
    }
}
