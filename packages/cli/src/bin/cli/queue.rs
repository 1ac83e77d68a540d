// ABOUTME: `runbox queue` - operator tools for the lifecycle intent queue
// ABOUTME: Validates intents before enqueueing and shows waiting and dead-lettered work

use super::utils::open_database;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use runbox_cli::config::WorkerConfig;
use runbox_core::LifecycleIntent;
use runbox_storage::{IntentQueue, SqliteIntentQueue};

/// Longest payload/error excerpt shown in the dead-letter table
const EXCERPT_LEN: usize = 60;

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Enqueue a lifecycle intent given as JSON
    Push {
        /// e.g. '{"type":"down","ip":"10.0.0.5"}'
        intent: String,
    },
    /// Show how many intents are waiting
    Status,
    /// List intents that exhausted their retries
    DeadLetters,
}

pub async fn handle_queue_command(command: QueueCommands) -> Result<()> {
    let config = WorkerConfig::from_env();
    let db = open_database(&config.database_path).await?;
    let queue = SqliteIntentQueue::new(&db, config.queue_name.clone());

    match command {
        QueueCommands::Push { intent } => {
            let parsed = LifecycleIntent::parse(&intent).context("Rejected intent")?;
            let id = queue.push(&intent).await?;
            println!(
                "{} Queued {} intent #{} on {}",
                "✓".green(),
                parsed.kind().as_str(),
                id,
                queue.name().cyan()
            );
        }
        QueueCommands::Status => {
            let waiting = queue.len().await?;
            let dead = queue.dead_letters().await?.len();
            println!("Queue:        {}", queue.name().cyan());
            println!("Waiting:      {}", waiting.to_string().cyan());
            println!("Dead letters: {}", dead.to_string().red());
        }
        QueueCommands::DeadLetters => {
            let letters = queue.dead_letters().await?;
            if letters.is_empty() {
                println!("{}", "No dead-lettered intents".green());
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(vec!["ID", "Attempts", "Failed", "Error", "Payload"]);
            for letter in &letters {
                table.add_row(vec![
                    letter.id.to_string(),
                    letter.attempts.to_string(),
                    letter.failed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    truncate(&letter.error, EXCERPT_LEN),
                    truncate(&letter.payload, EXCERPT_LEN),
                ]);
            }

            println!("{}", table);
            println!("Total: {} dead letters", letters.len().to_string().red());
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
