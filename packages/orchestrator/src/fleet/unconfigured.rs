// ABOUTME: Fleet provider used when no compute backend is configured
// ABOUTME: Placeholder implementation - returns NotSupported for all operations

use super::{FleetError, FleetProvider, Result};
use async_trait::async_trait;
use runbox_core::{FleetNode, Project};
use tracing::warn;

/// Stand-in until a cloud backend is wired up.
///
/// Every intent that reaches it is dead-lettered, since retrying cannot help.
#[derive(Debug, Default)]
pub struct UnconfiguredFleetProvider;

impl UnconfiguredFleetProvider {
    pub fn new() -> Self {
        Self
    }

    fn not_supported(&self) -> FleetError {
        FleetError::NotSupported(
            "No fleet backend is configured. Set RUNBOX_STATIC_NODES to a list of \
             node-id=address pairs to use pre-provisioned hosts."
                .to_string(),
        )
    }
}

#[async_trait]
impl FleetProvider for UnconfiguredFleetProvider {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn provision(&self, project: &Project) -> Result<FleetNode> {
        warn!(
            "Cannot provision a node for project {}: no fleet backend configured",
            project.id
        );
        Err(self.not_supported())
    }

    async fn destroy(&self, _node_id: &str) -> Result<()> {
        Err(self.not_supported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_destroy_is_not_supported() {
        let provider = UnconfiguredFleetProvider::new();
        let err = provider.destroy("i-1").await.unwrap_err();

        assert!(matches!(err, FleetError::NotSupported(_)));
        assert!(!err.is_retryable());
    }
}
