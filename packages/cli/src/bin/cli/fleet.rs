// ABOUTME: `runbox fleet` - list registered nodes or tear the whole fleet down
// ABOUTME: Reads the shared registry; decommission goes through the orchestrator

use super::utils::{build_fleet, open_database};
use anyhow::{bail, Result};
use clap::Subcommand;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use runbox_cli::config::WorkerConfig;
use runbox_orchestrator::LifecycleOrchestrator;
use runbox_storage::{
    InstanceRegistry, SqliteCompletionLog, SqliteInstanceRegistry, SqliteIntentQueue,
};
use std::sync::Arc;

#[derive(Subcommand)]
pub enum FleetCommands {
    /// List registered fleet nodes
    List {
        /// Print the registry snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Destroy every registered node
    Decommission,
}

pub async fn handle_fleet_command(command: FleetCommands) -> Result<()> {
    match command {
        FleetCommands::List { json } => list_nodes(json).await,
        FleetCommands::Decommission => decommission().await,
    }
}

async fn list_nodes(json: bool) -> Result<()> {
    let config = WorkerConfig::from_env();
    let db = open_database(&config.database_path).await?;
    let registry = SqliteInstanceRegistry::new(&db);

    if json {
        println!("{}", registry.snapshot_json().await?);
        return Ok(());
    }

    let nodes = registry.list().await?;
    if nodes.is_empty() {
        println!("{}", "No fleet nodes registered".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Node ID", "Address"]);
    for node in &nodes {
        table.add_row(vec![node.node_id.clone(), node.address.clone()]);
    }

    println!("{}", table);
    println!("Total: {} nodes", nodes.len().to_string().cyan());
    Ok(())
}

async fn decommission() -> Result<()> {
    let config = WorkerConfig::from_env();
    let db = open_database(&config.database_path).await?;

    let registry = Arc::new(SqliteInstanceRegistry::new(&db));
    let fleet = build_fleet(&config.static_nodes, registry.clone()).await?;
    let orchestrator = LifecycleOrchestrator::new(
        Arc::new(SqliteIntentQueue::new(&db, config.queue_name.clone())),
        registry,
        fleet,
        Arc::new(SqliteCompletionLog::new(&db)),
        config.orchestrator,
    );

    let report = orchestrator.decommission_all().await?;

    for node in &report.destroyed {
        println!("{} {} ({})", "✓".green(), node.node_id, node.address);
    }
    for (node, error) in &report.failed {
        println!("{} {} ({}): {}", "✗".red(), node.node_id, node.address, error);
    }

    if !report.failed.is_empty() {
        bail!(
            "{} node(s) could not be destroyed and remain registered",
            report.failed.len()
        );
    }

    println!(
        "Destroyed {} node(s)",
        report.destroyed.len().to_string().cyan()
    );
    Ok(())
}
