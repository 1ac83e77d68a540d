// ABOUTME: Fleet provider handing out nodes from a fixed pool of pre-provisioned hosts
// ABOUTME: A node is free whenever its address is absent from the shared registry

use super::{FleetError, FleetProvider, Result};
use async_trait::async_trait;
use runbox_core::{FleetNode, Project};
use runbox_storage::InstanceRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Pool of long-lived hosts, each running the sandbox container.
///
/// Lease state is read from the registry on every provision, so several
/// workers and operator commands can share one pool. Two workers picking the
/// same node at once is settled by the registry's conflict check.
pub struct StaticFleetProvider {
    nodes: Vec<FleetNode>,
    registry: Arc<dyn InstanceRegistry>,
}

impl StaticFleetProvider {
    pub fn new(nodes: Vec<FleetNode>, registry: Arc<dyn InstanceRegistry>) -> Self {
        Self { nodes, registry }
    }

    /// Build a pool from `node-id=address` entries
    pub fn from_entries(entries: &[String], registry: Arc<dyn InstanceRegistry>) -> Result<Self> {
        let mut nodes: Vec<FleetNode> = Vec::with_capacity(entries.len());

        for entry in entries {
            let (node_id, address) = entry
                .split_once('=')
                .map(|(id, addr)| (id.trim(), addr.trim()))
                .filter(|(id, addr)| !id.is_empty() && !addr.is_empty())
                .ok_or_else(|| {
                    FleetError::InvalidConfig(format!(
                        "expected node-id=address, got {:?}",
                        entry
                    ))
                })?;

            if nodes
                .iter()
                .any(|n| n.node_id == node_id || n.address == address)
            {
                return Err(FleetError::InvalidConfig(format!(
                    "duplicate node in pool: {}",
                    entry
                )));
            }

            nodes.push(FleetNode::new(node_id, address));
        }

        Ok(Self::new(nodes, registry))
    }

    pub fn contains(&self, node: &FleetNode) -> bool {
        self.nodes.contains(node)
    }

    /// Pool nodes whose address is not registered
    pub async fn available(&self) -> Result<Vec<FleetNode>> {
        let mut free = Vec::new();
        for node in &self.nodes {
            let registered = self
                .registry
                .find(&node.address)
                .await
                .map_err(|e| FleetError::Transport(format!("registry lookup failed: {}", e)))?;
            if registered.is_none() {
                free.push(node.clone());
            }
        }
        Ok(free)
    }
}

#[async_trait]
impl FleetProvider for StaticFleetProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn provision(&self, project: &Project) -> Result<FleetNode> {
        let node = self.available().await?.into_iter().next().ok_or_else(|| {
            FleetError::ProvisionFailed("static pool has no free nodes".to_string())
        })?;

        info!(
            "Leased node {} at {} for project {}",
            node.node_id, node.address, project.id
        );
        Ok(node)
    }

    async fn destroy(&self, node_id: &str) -> Result<()> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.node_id == node_id)
            .ok_or_else(|| FleetError::NodeNotFound(node_id.to_string()))?;

        // The host stays up; deregistering it is what returns it to the pool
        debug!("Released node {} at {}", node.node_id, node.address);
        Ok(())
    }
}
