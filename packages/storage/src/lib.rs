// ABOUTME: Persistence layer for runbox
// ABOUTME: SQLite-backed fleet registry, lifecycle intent queue and completion channel

pub mod completion;
pub mod database;
pub mod error;
pub mod queue;
pub mod registry;

pub use completion::{CompletionPublisher, SqliteCompletionLog};
pub use database::Database;
pub use error::{Result, StorageError};
pub use queue::{DeadLetter, IntentQueue, QueuedIntent, SqliteIntentQueue, DEFAULT_POLL_INTERVAL};
pub use registry::{InstanceRegistry, SqliteInstanceRegistry};
