// ABOUTME: Library half of the runbox binary
// ABOUTME: Process configuration and logging setup shared by every subcommand

pub mod config;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins, otherwise `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests;
