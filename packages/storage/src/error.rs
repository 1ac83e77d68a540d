// ABOUTME: Error types for runbox persistence
// ABOUTME: Covers database transport failures, registry conflicts and missing records

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A put hit an address (or node id) that is already registered.
    /// Overwrites are never allowed; a duplicate implies a fleet anomaly.
    #[error("Registry conflict: address {address} or node {node_id} is already registered")]
    RegistryConflict { address: String, node_id: String },
}

impl StorageError {
    /// Whether retrying the same operation later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
