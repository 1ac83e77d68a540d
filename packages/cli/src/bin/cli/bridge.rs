// ABOUTME: `runbox bridge` - serves the realtime WebSocket bridge until Ctrl-C
// ABOUTME: Connects to fleet nodes over the remote Docker API on demand

use super::utils::{open_database, shutdown_token};
use anyhow::{Context, Result};
use colored::*;
use runbox_bridge::{serve, BridgeState};
use runbox_cli::config::BridgeConfig;
use runbox_sandbox::DockerConnector;
use runbox_storage::{SqliteCompletionLog, SqliteInstanceRegistry};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run_bridge(host: Option<IpAddr>, port: Option<u16>) -> Result<()> {
    let config = BridgeConfig::from_env()?;
    let addr = SocketAddr::new(host.unwrap_or(config.host), port.unwrap_or(config.port));

    let db = open_database(&config.database_path).await?;
    let state = Arc::new(BridgeState {
        completions: SqliteCompletionLog::new(&db),
        registry: Arc::new(SqliteInstanceRegistry::new(&db)),
        connector: Arc::new(DockerConnector::new(
            config.docker_port,
            config.docker_timeout_secs,
        )),
        settings: config.settings,
    });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!(
        "{} Bridge listening on {}",
        "✅".green(),
        format!("ws://{}/ws", addr).cyan()
    );

    let token = shutdown_token();
    serve(listener, state, async move { token.cancelled().await }).await?;

    println!("{}", "Bridge stopped".yellow());
    Ok(())
}
