// ABOUTME: Fleet provider capability that creates and destroys compute nodes
// ABOUTME: Injected into the orchestrator so tests and deployments can substitute their own

use async_trait::async_trait;
use runbox_core::{FleetNode, Project};
use thiserror::Error;

pub mod static_pool;
pub mod unconfigured;

pub use static_pool::StaticFleetProvider;
pub use unconfigured::UnconfiguredFleetProvider;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Provisioning failed: {0}")]
    ProvisionFailed(String),

    #[error("Failed to destroy node {node_id}: {reason}")]
    DestroyFailed { node_id: String, reason: String },

    #[error("Fleet node not found: {0}")]
    NodeNotFound(String),

    #[error("Fleet transport error: {0}")]
    Transport(String),

    #[error("Invalid fleet configuration: {0}")]
    InvalidConfig(String),
}

impl FleetError {
    /// Whether the same call could succeed if tried again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvisionFailed(_) | Self::DestroyFailed { .. } | Self::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;

/// Creates and destroys fleet nodes
#[async_trait]
pub trait FleetProvider: Send + Sync {
    /// Human readable provider name for logs
    fn name(&self) -> &'static str;

    /// Bring up a node able to host the project's sandbox
    async fn provision(&self, project: &Project) -> Result<FleetNode>;

    /// Tear down a node. Fails with [`FleetError::NodeNotFound`] when the
    /// provider no longer knows the node.
    async fn destroy(&self, node_id: &str) -> Result<()>;
}
