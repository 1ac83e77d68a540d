use clap::{Parser, Subcommand};
use colored::*;
use std::net::IpAddr;
use std::process;

mod cli;

use cli::fleet::FleetCommands;
use cli::queue::QueueCommands;

#[derive(Parser)]
#[command(name = "runbox")]
#[command(about = "runbox - on-demand sandboxes for browser-based coding")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume lifecycle intents and keep the fleet in step
    Worker,
    /// Serve the realtime bridge for browser clients
    Bridge {
        /// Address to bind (overrides RUNBOX_BRIDGE_HOST)
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind (overrides RUNBOX_BRIDGE_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect and manage registered fleet nodes
    #[command(subcommand)]
    Fleet(FleetCommands),
    /// Inspect and feed the lifecycle intent queue
    #[command(subcommand)]
    Queue(QueueCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    runbox_cli::init_tracing();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Worker => cli::worker::run_worker().await,
        Commands::Bridge { host, port } => cli::bridge::run_bridge(host, port).await,
        Commands::Fleet(fleet_cmd) => cli::fleet::handle_fleet_command(fleet_cmd).await,
        Commands::Queue(queue_cmd) => cli::queue::handle_queue_command(queue_cmd).await,
    }
}
