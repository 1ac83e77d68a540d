// ABOUTME: Completion channel announcing which address now serves a project
// ABOUTME: Events are appended to SQLite so readers in other processes can pick them up

use async_trait::async_trait;
use chrono::Utc;
use runbox_core::CompletionEvent;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::database::Database;
use crate::error::Result;

/// Publishes `{project, ip}` on the project's channel after a successful provision
#[async_trait]
pub trait CompletionPublisher: Send + Sync {
    async fn publish(&self, event: &CompletionEvent) -> Result<()>;
}

/// Durable completion channel keyed by project id.
///
/// Only the latest event per project is kept, and deregistering a node
/// retracts the events that announced its address.
#[derive(Clone)]
pub struct SqliteCompletionLog {
    pool: SqlitePool,
}

impl SqliteCompletionLog {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    /// Most recent event published for a project
    pub async fn latest_for_project(&self, project_id: &str) -> Result<Option<CompletionEvent>> {
        let row = sqlx::query(
            r#"
            SELECT payload FROM completion_events
            WHERE project_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    /// Wait up to `timeout` for an event on the project's channel, checking
    /// every `poll_interval`. Returns `None` when nothing arrived in time.
    pub async fn wait_for_project(
        &self,
        project_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Option<CompletionEvent>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(event) = self.latest_for_project(project_id).await? {
                return Ok(Some(event));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep_until(std::cmp::min(
                deadline,
                tokio::time::Instant::now() + poll_interval,
            ))
            .await;
        }
    }
}

#[async_trait]
impl CompletionPublisher for SqliteCompletionLog {
    async fn publish(&self, event: &CompletionEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM completion_events WHERE project_id = ?")
            .bind(&event.project.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO completion_events (project_id, address, payload, published_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&event.project.id)
        .bind(&event.ip)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "Published completion for project {} at {}",
            event.project.id, event.ip
        );
        Ok(())
    }
}
