// ABOUTME: `runbox worker` - drains the lifecycle intent queue until Ctrl-C
// ABOUTME: Wires SQLite storage and the configured fleet into the orchestrator

use super::utils::{build_fleet, open_database, shutdown_token};
use anyhow::Result;
use colored::*;
use runbox_cli::config::WorkerConfig;
use runbox_orchestrator::LifecycleOrchestrator;
use runbox_storage::{SqliteCompletionLog, SqliteInstanceRegistry, SqliteIntentQueue};
use std::sync::Arc;

pub async fn run_worker() -> Result<()> {
    let config = WorkerConfig::from_env();
    let db = open_database(&config.database_path).await?;

    let registry = Arc::new(SqliteInstanceRegistry::new(&db));
    let fleet = build_fleet(&config.static_nodes, registry.clone()).await?;
    let queue = Arc::new(
        SqliteIntentQueue::new(&db, config.queue_name.clone())
            .with_poll_interval(config.poll_interval),
    );
    let publisher = Arc::new(SqliteCompletionLog::new(&db));

    println!(
        "{} consuming queue {} with the {} fleet",
        "▶".green().bold(),
        config.queue_name.cyan(),
        fleet.name().cyan()
    );

    let orchestrator =
        LifecycleOrchestrator::new(queue, registry, fleet, publisher, config.orchestrator);
    orchestrator.run(shutdown_token()).await;

    println!("{}", "Worker stopped".yellow());
    Ok(())
}
