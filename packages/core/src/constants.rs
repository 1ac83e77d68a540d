// ABOUTME: Filesystem locations and fixed names shared across runbox packages
// ABOUTME: Resolves the runbox home directory and default database location

use std::env;
use std::path::PathBuf;

/// Name of the queue lifecycle intents are pushed to by the front end
pub const DEFAULT_QUEUE_NAME: &str = "project";

/// Name of the container every fleet node image ships with
pub const DEFAULT_CONTAINER_NAME: &str = "node";

/// Get the path to the runbox directory (~/.runbox)
pub fn runbox_dir() -> PathBuf {
    // HOME wins so tests can redirect it
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".runbox")
    } else {
        dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".runbox")
    }
}

/// Get the default SQLite database path (~/.runbox/runbox.db)
pub fn default_database_path() -> PathBuf {
    runbox_dir().join("runbox.db")
}

/// Get the default local staging area for container archives
pub fn default_staging_dir() -> PathBuf {
    env::temp_dir().join("runbox-staging")
}
