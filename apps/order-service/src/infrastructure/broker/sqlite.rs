//! Durable order broker on SQLite (sqlx).
//!
//! Rows in `broker_messages` move `ready -> in_flight -> (deleted | ready | dead)`.
//! A publish returns once its INSERT has committed. Rows left `in_flight`
//! by a crashed process are returned to `ready` when the broker starts,
//! which is what makes delivery at-least-once. Each recovery counts as a
//! redelivery so a message that keeps crashing its worker still runs out
//! of budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Pool, Sqlite};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::application::ports::{BrokerError, BrokerMessage, DeadLetter, Delivery, OrderBroker};
use crate::domain::shared::Timestamp;
use crate::error::ErrorCode;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS broker_messages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    queue            TEXT NOT NULL,
    payload          TEXT NOT NULL,
    state            TEXT NOT NULL,
    redelivery_count INTEGER NOT NULL DEFAULT 0,
    last_error       TEXT,
    updated_at       INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_broker_messages_queue_state ON broker_messages (queue, state, id);
";

const STATE_READY: &str = "ready";
const STATE_IN_FLIGHT: &str = "in_flight";
const STATE_DEAD: &str = "dead";

/// Last error recorded on rows recovered from a previous process.
const RECOVERED_REASON: &str = "lease lost on restart";

#[derive(Debug, FromRow)]
struct LeasedRow {
    id: i64,
    payload: String,
    redelivery_count: i64,
}

#[derive(Debug, FromRow)]
struct DeadRow {
    payload: String,
    redelivery_count: i64,
    last_error: Option<String>,
    updated_at: i64,
}

fn map_sqlx_error(err: sqlx::Error) -> BrokerError {
    match err {
        sqlx::Error::PoolTimedOut => BrokerError::Timeout(err.to_string()),
        other => BrokerError::Unavailable(other.to_string()),
    }
}

fn tag_of(id: i64) -> u64 {
    u64::try_from(id).unwrap_or_default()
}

fn count_of(raw: i64) -> u32 {
    u32::try_from(raw).unwrap_or(u32::MAX)
}

/// Settings for [`SqliteOrderBroker::connect`].
#[derive(Debug, Clone)]
pub struct SqliteBrokerSettings {
    /// SQLite connection URL.
    pub database_url: String,
    /// Main queue name.
    pub main_queue: String,
    /// Dead-letter queue name.
    pub dead_letter_queue: String,
    /// How often idle consumers poll for rows written by other processes.
    pub poll_interval: Duration,
    /// Pool size.
    pub max_connections: u32,
}

/// Durable `OrderBroker` backed by SQLite.
#[derive(Debug)]
pub struct SqliteOrderBroker {
    pool: Pool<Sqlite>,
    main_queue: String,
    dead_letter_queue: String,
    poll_interval: Duration,
    notify: Notify,
    closed: AtomicBool,
}

impl SqliteOrderBroker {
    /// Open the queue database, create the schema and recover in-flight rows.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the database cannot be opened.
    pub async fn connect(settings: SqliteBrokerSettings) -> Result<Self, BrokerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect(&settings.database_url)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(map_sqlx_error)?;

        let broker = Self {
            pool,
            main_queue: settings.main_queue,
            dead_letter_queue: settings.dead_letter_queue,
            poll_interval: settings.poll_interval,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        };
        let recovered = broker.recover_in_flight().await?;
        if recovered > 0 {
            info!(recovered, queue = %broker.main_queue, "Returned in-flight messages to the queue");
        }
        Ok(broker)
    }

    /// Return every in-flight row to `ready`, counting the lost lease as a
    /// redelivery. Returns how many moved.
    async fn recover_in_flight(&self) -> Result<u64, BrokerError> {
        let result = sqlx::query(
            "UPDATE broker_messages SET state = ?, redelivery_count = redelivery_count + 1, \
             last_error = ?, updated_at = ? WHERE queue = ? AND state = ?",
        )
        .bind(STATE_READY)
        .bind(RECOVERED_REASON)
        .bind(Timestamp::now().unix_millis())
        .bind(&self.main_queue)
        .bind(STATE_IN_FLIGHT)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    /// Messages currently parked on the dead-letter queue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, BrokerError> {
        let rows = sqlx::query_as::<_, DeadRow>(
            "SELECT payload, redelivery_count, last_error, updated_at FROM broker_messages \
             WHERE queue = ? AND state = ? ORDER BY id",
        )
        .bind(&self.dead_letter_queue)
        .bind(STATE_DEAD)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok::<_, BrokerError>(DeadLetter {
                    message: BrokerMessage::decode(&row.payload)?,
                    reason: row.last_error.unwrap_or_default(),
                    redelivery_count: count_of(row.redelivery_count),
                    dead_lettered_at: Timestamp::from_unix_millis(row.updated_at)
                        .unwrap_or_else(Timestamp::now),
                })
            })
            .collect()
    }

    /// Messages waiting on the main queue.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn ready_len(&self) -> Result<u64, BrokerError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM broker_messages WHERE queue = ? AND state = ?")
                .bind(&self.main_queue)
                .bind(STATE_READY)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn lease_next(&self) -> Result<Option<LeasedRow>, BrokerError> {
        sqlx::query_as::<_, LeasedRow>(
            "UPDATE broker_messages SET state = ?, updated_at = ? \
             WHERE id = (SELECT id FROM broker_messages WHERE queue = ? AND state = ? \
                         ORDER BY id LIMIT 1) \
             RETURNING id, payload, redelivery_count",
        )
        .bind(STATE_IN_FLIGHT)
        .bind(Timestamp::now().unix_millis())
        .bind(&self.main_queue)
        .bind(STATE_READY)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn move_to_dead(&self, id: i64, reason: &str) -> Result<u64, BrokerError> {
        let result = sqlx::query(
            "UPDATE broker_messages SET queue = ?, state = ?, last_error = ?, updated_at = ? \
             WHERE id = ? AND state = ?",
        )
        .bind(&self.dead_letter_queue)
        .bind(STATE_DEAD)
        .bind(reason)
        .bind(Timestamp::now().unix_millis())
        .bind(id)
        .bind(STATE_IN_FLIGHT)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    fn delivery_id(delivery: &Delivery) -> Result<i64, BrokerError> {
        i64::try_from(delivery.tag).map_err(|_| BrokerError::UnknownDelivery(delivery.tag))
    }
}

#[async_trait]
impl OrderBroker for SqliteOrderBroker {
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Unavailable("broker is closed".to_string()));
        }
        sqlx::query(
            "INSERT INTO broker_messages (queue, payload, state, redelivery_count, updated_at) \
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&self.main_queue)
        .bind(message.encode()?)
        .bind(STATE_READY)
        .bind(Timestamp::now().unix_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }

            if let Some(row) = self.lease_next().await? {
                match BrokerMessage::decode(&row.payload) {
                    Ok(message) => {
                        return Ok(Some(Delivery {
                            tag: tag_of(row.id),
                            routing_key: self.main_queue.clone(),
                            message,
                            redelivery_count: count_of(row.redelivery_count),
                        }));
                    }
                    Err(e) => {
                        warn!(id = row.id, error = %e, "Dead-lettering undecodable payload");
                        let reason = format!("{}: {e}", ErrorCode::PoisonMessage.reason());
                        self.move_to_dead(row.id, &reason).await?;
                        continue;
                    }
                }
            }

            tokio::select! {
                () = notified.as_mut() => {}
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let result = sqlx::query("DELETE FROM broker_messages WHERE id = ? AND state = ?")
            .bind(Self::delivery_id(delivery)?)
            .bind(STATE_IN_FLIGHT)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(BrokerError::UnknownDelivery(delivery.tag));
        }
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        let result = sqlx::query(
            "UPDATE broker_messages SET state = ?, redelivery_count = redelivery_count + 1, \
             last_error = ?, updated_at = ? WHERE id = ? AND state = ?",
        )
        .bind(STATE_READY)
        .bind(reason)
        .bind(Timestamp::now().unix_millis())
        .bind(Self::delivery_id(delivery)?)
        .bind(STATE_IN_FLIGHT)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(BrokerError::UnknownDelivery(delivery.tag));
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn nack_dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        if self.move_to_dead(Self::delivery_id(delivery)?, reason).await? == 0 {
            return Err(BrokerError::UnknownDelivery(delivery.tag));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Unavailable("broker is closed".to_string()));
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}
