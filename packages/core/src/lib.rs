// ABOUTME: Core types and constants for runbox
// ABOUTME: Foundational package shared by the orchestrator, storage, gateway and bridge

pub mod constants;
pub mod types;

// Re-export main types
pub use types::{
    CompletionEvent, DirectoryEntry, FleetNode, IntentError, IntentKind, IntentRecord, Language,
    LifecycleIntent, Project,
};

// Re-export constants
pub use constants::{
    default_database_path, default_staging_dir, runbox_dir, DEFAULT_CONTAINER_NAME,
    DEFAULT_QUEUE_NAME,
};
