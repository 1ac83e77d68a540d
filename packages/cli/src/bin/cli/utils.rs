// ABOUTME: Helpers shared by the runbox subcommands
// ABOUTME: Opens the shared database and assembles the configured fleet provider

use anyhow::{Context, Result};
use runbox_orchestrator::{FleetProvider, StaticFleetProvider, UnconfiguredFleetProvider};
use runbox_storage::{Database, InstanceRegistry};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn open_database(path: &Path) -> Result<Database> {
    Database::connect(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Build the fleet provider from `node-id=address` entries. The static pool
/// reads leases from `registry`, so every process sharing it agrees on them.
pub async fn build_fleet(
    static_nodes: &[String],
    registry: Arc<dyn InstanceRegistry>,
) -> Result<Arc<dyn FleetProvider>> {
    if static_nodes.is_empty() {
        warn!("No fleet configured; RUNBOX_STATIC_NODES is unset and provisioning will fail");
        return Ok(Arc::new(UnconfiguredFleetProvider::new()));
    }

    let provider = StaticFleetProvider::from_entries(static_nodes, registry.clone())
        .context("Invalid RUNBOX_STATIC_NODES")?;

    for node in registry.list().await? {
        if !provider.contains(&node) {
            warn!(
                "Registered node {} at {} is not part of the static pool",
                node.node_id, node.address
            );
        }
    }

    info!(
        "Static fleet ready with {} free node(s)",
        provider.available().await?.len()
    );
    Ok(Arc::new(provider))
}

/// A token cancelled on the first Ctrl-C
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });
    token
}
