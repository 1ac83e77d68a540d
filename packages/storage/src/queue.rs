// ABOUTME: Durable FIFO work queue of lifecycle intents with retry and dead-letter support
// ABOUTME: Blocking, cancellable pop built on atomic claim-by-delete in SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::Result;

/// Default cross-process polling interval while the queue is empty
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A claimed queue item. Once popped it belongs to the caller, who must
/// finish it, [`IntentQueue::requeue`] it or [`IntentQueue::dead_letter`] it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedIntent {
    pub id: i64,
    pub payload: String,
    /// Failed attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// An intent parked after it could not be processed
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub id: i64,
    pub payload: String,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[async_trait]
pub trait IntentQueue: Send + Sync {
    /// Append a raw intent payload to the tail of the queue
    async fn push(&self, payload: &str) -> Result<i64>;

    /// Claim the oldest ready item without waiting
    async fn try_pop(&self) -> Result<Option<QueuedIntent>>;

    /// Block until an item is claimed. Returns `None` only when `cancel`
    /// fires; there is no timeout.
    async fn pop(&self, cancel: &CancellationToken) -> Result<Option<QueuedIntent>>;

    /// Put a failed item back with one more attempt recorded, hidden for `delay`
    async fn requeue(&self, item: QueuedIntent, error: &str, delay: Duration) -> Result<()>;

    /// Move an item to the dead-letter sink, counting the failure that put it there
    async fn dead_letter(&self, item: QueuedIntent, error: &str) -> Result<()>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>>;

    /// Items waiting, ready or delayed
    async fn len(&self) -> Result<u64>;
}

/// SQLite-backed [`IntentQueue`].
///
/// Items are claimed with a single `DELETE ... RETURNING`, so two consumers
/// never receive the same item. In-process pushes wake a waiting consumer
/// immediately; pushes from other processes are noticed on the next poll.
#[derive(Clone)]
pub struct SqliteIntentQueue {
    pool: SqlitePool,
    name: String,
    poll_interval: Duration,
    notify: Arc<Notify>,
}

impl SqliteIntentQueue {
    pub fn new(database: &Database, name: impl Into<String>) -> Self {
        Self {
            pool: database.pool().clone(),
            name: name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn insert(
        &self,
        payload: &str,
        attempts: u32,
        last_error: Option<&str>,
        available_at: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO intent_queue (queue, payload, attempts, last_error, available_at, enqueued_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.name)
        .bind(payload)
        .bind(attempts as i64)
        .bind(last_error)
        .bind(available_at)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.notify.notify_one();
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl IntentQueue for SqliteIntentQueue {
    async fn push(&self, payload: &str) -> Result<i64> {
        let id = self
            .insert(payload, 0, None, Utc::now().timestamp_millis())
            .await?;
        debug!("Pushed item {} onto queue '{}'", id, self.name);
        Ok(id)
    }

    async fn try_pop(&self) -> Result<Option<QueuedIntent>> {
        let row = sqlx::query(
            r#"
            DELETE FROM intent_queue
            WHERE id = (
                SELECT id FROM intent_queue
                WHERE queue = ? AND available_at <= ?
                ORDER BY id ASC
                LIMIT 1
            )
            RETURNING id, payload, attempts, last_error, enqueued_at
            "#,
        )
        .bind(&self.name)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let enqueued_at: String = row.try_get("enqueued_at")?;
        let attempts: i64 = row.try_get("attempts")?;

        Ok(Some(QueuedIntent {
            id: row.try_get("id")?,
            payload: row.try_get("payload")?,
            attempts: attempts.max(0) as u32,
            last_error: row.try_get("last_error")?,
            enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn pop(&self, cancel: &CancellationToken) -> Result<Option<QueuedIntent>> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(item) = self.try_pop().await? {
                return Ok(Some(item));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn requeue(&self, item: QueuedIntent, error: &str, delay: Duration) -> Result<()> {
        let attempts = item.attempts + 1;
        let available_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        let id = self
            .insert(&item.payload, attempts, Some(error), available_at)
            .await?;

        info!(
            "Requeued item {} as {} on '{}' (attempt {}, retry in {:?})",
            item.id, id, self.name, attempts, delay
        );
        Ok(())
    }

    async fn dead_letter(&self, item: QueuedIntent, error: &str) -> Result<()> {
        let attempts = item.attempts + 1;

        sqlx::query(
            r#"
            INSERT INTO dead_letter_intents (queue, payload, attempts, error, failed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.name)
        .bind(&item.payload)
        .bind(attempts as i64)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        warn!(
            "Moved item {} on '{}' to dead letters after {} attempt(s): {}",
            item.id, self.name, attempts, error
        );
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query(
            r#"
            SELECT id, payload, attempts, error, failed_at
            FROM dead_letter_intents
            WHERE queue = ?
            ORDER BY id ASC
            "#,
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let failed_at: String = row.try_get("failed_at")?;
                let attempts: i64 = row.try_get("attempts")?;
                Ok(DeadLetter {
                    id: row.try_get("id")?,
                    payload: row.try_get("payload")?,
                    attempts: attempts.max(0) as u32,
                    error: row.try_get("error")?,
                    failed_at: DateTime::parse_from_rfc3339(&failed_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM intent_queue WHERE queue = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
