// ABOUTME: Durable registry of orchestrator-managed fleet nodes
// ABOUTME: Maps node address to node id with an atomic, conflict-checked insert

use async_trait::async_trait;
use chrono::Utc;
use runbox_core::FleetNode;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{Result, StorageError};

/// Which addresses currently correspond to live, orchestrator-managed nodes.
///
/// The registry is the source of truth: an address missing here is not
/// orchestrated by runbox even if a node still answers on it.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Record a node. Fails with [`StorageError::RegistryConflict`] when the
    /// address or node id is already present; existing entries are never
    /// overwritten.
    async fn put(&self, address: &str, node_id: &str) -> Result<FleetNode>;

    /// Look up a node by address, `None` when absent
    async fn find(&self, address: &str) -> Result<Option<FleetNode>>;

    /// Look up a node by its fleet identifier, `None` when absent
    async fn find_by_node_id(&self, node_id: &str) -> Result<Option<FleetNode>>;

    /// Delete an entry, retracting any completion events that announced this
    /// address. Returns whether anything was removed; absent addresses are a
    /// no-op.
    async fn remove(&self, address: &str) -> Result<bool>;

    /// Every registered node, in no particular order
    async fn list(&self) -> Result<Vec<FleetNode>>;

    /// Look up a node by address, failing with [`StorageError::NotFound`]
    async fn get(&self, address: &str) -> Result<FleetNode> {
        self.find(address)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("fleet node at {}", address)))
    }

    /// Aggregate view of the whole fleet as a JSON list of `{id, ip}`
    async fn snapshot_json(&self) -> Result<String> {
        let nodes = self.list().await?;
        Ok(serde_json::to_string(&nodes)?)
    }
}

/// SQLite-backed [`InstanceRegistry`]
#[derive(Clone)]
pub struct SqliteInstanceRegistry {
    pool: SqlitePool,
}

impl SqliteInstanceRegistry {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    fn row_to_node(row: &sqlx::sqlite::SqliteRow) -> Result<FleetNode> {
        Ok(FleetNode {
            node_id: row.try_get("node_id")?,
            address: row.try_get("address")?,
        })
    }
}

#[async_trait]
impl InstanceRegistry for SqliteInstanceRegistry {
    async fn put(&self, address: &str, node_id: &str) -> Result<FleetNode> {
        // The primary key does the conflict check inside the insert itself,
        // so concurrent orchestrators cannot both win.
        let result = sqlx::query(
            "INSERT INTO fleet_nodes (address, node_id, registered_at) VALUES (?, ?, ?)",
        )
        .bind(address)
        .bind(node_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Registered fleet node {} at {}", node_id, address);
                Ok(FleetNode::new(node_id, address))
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::RegistryConflict {
                    address: address.to_string(),
                    node_id: node_id.to_string(),
                })
            }
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    async fn find(&self, address: &str) -> Result<Option<FleetNode>> {
        let row = sqlx::query("SELECT address, node_id FROM fleet_nodes WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_node).transpose()
    }

    async fn find_by_node_id(&self, node_id: &str) -> Result<Option<FleetNode>> {
        let row = sqlx::query("SELECT address, node_id FROM fleet_nodes WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_node).transpose()
    }

    async fn remove(&self, address: &str) -> Result<bool> {
        // A reused address must not route an old project's clients to the
        // next project served from it
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM fleet_nodes WHERE address = ?")
            .bind(address)
            .execute(&mut *tx)
            .await?;
        let retracted = sqlx::query("DELETE FROM completion_events WHERE address = ?")
            .bind(address)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(
                "Deregistered fleet node at {} ({} completion event(s) retracted)",
                address,
                retracted.rows_affected()
            );
        } else {
            debug!("No fleet node registered at {}, nothing to remove", address);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<FleetNode>> {
        let rows = sqlx::query("SELECT address, node_id FROM fleet_nodes ORDER BY registered_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_node).collect()
    }
}
