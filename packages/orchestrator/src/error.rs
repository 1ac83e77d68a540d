// ABOUTME: Error types for processing lifecycle intents
// ABOUTME: Classifies failures as retryable or terminal for the requeue policy

use crate::fleet::FleetError;
use runbox_core::{FleetNode, IntentError};
use runbox_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Payload was not a well-formed lifecycle intent
    #[error("Malformed intent: {0}")]
    MalformedIntent(#[from] IntentError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A node came up but could not be recorded in the registry
    #[error("Node {} at {} provisioned but not registered (rolled back: {rolled_back}): {source}", .node.node_id, .node.address)]
    RegistrationFailed {
        node: FleetNode,
        rolled_back: bool,
        #[source]
        source: StorageError,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// The provider call was abandoned, not cancelled; it may still create a node
    #[error("Provisioning for project {project_id} timed out after {timeout:?}; a node may be running unregistered")]
    ProvisionTimeout { project_id: String, timeout: Duration },
}

impl OrchestratorError {
    /// Whether requeueing the intent could lead to a different result
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MalformedIntent(_) => false,
            Self::Fleet(e) => e.is_retryable(),
            Self::Storage(e) => e.is_transient(),
            Self::RegistrationFailed { rolled_back, .. } => *rolled_back,
            Self::Timeout { .. } => true,
            Self::ProvisionTimeout { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
