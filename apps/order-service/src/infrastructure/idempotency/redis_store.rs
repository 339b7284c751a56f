//! Redis idempotency store.
//!
//! Records are JSON values under `idempotency:{user_id}:{fingerprint}`.
//! The PENDING write is a single `SET NX EX`; later updates use
//! `SET XX KEEPTTL` so the original expiry survives.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::domain::idempotency::{
    BeginOutcome, IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore,
    MAX_TTL_SECS, RecordedFailure,
};
use crate::domain::shared::{OrderId, Timestamp};

/// Idempotency store backed by Redis.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisIdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisIdempotencyStore").finish_non_exhaustive()
    }
}

fn unavailable(err: &redis::RedisError) -> IdempotencyError {
    IdempotencyError::Unavailable(err.to_string())
}

fn encode(record: &IdempotencyRecord) -> Result<String, IdempotencyError> {
    serde_json::to_string(record).map_err(|e| IdempotencyError::Corrupt {
        key: record.key.clone(),
        message: e.to_string(),
    })
}

fn decode(key: &str, payload: &str) -> Result<IdempotencyRecord, IdempotencyError> {
    serde_json::from_str(payload).map_err(|e| IdempotencyError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl RedisIdempotencyStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the URL is invalid or the server unreachable.
    pub async fn connect(url: &str) -> Result<Self, IdempotencyError> {
        let client = redis::Client::open(url).map_err(|e| unavailable(&e))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| unavailable(&e))?;
        Ok(Self { connection })
    }

    async fn read(&self, storage_key: &str) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(storage_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable(&e))?;
        payload
            .map(|p| decode(storage_key, &p))
            .transpose()
            .map(|r| r.filter(|record| !record.is_expired_at(Timestamp::now())))
    }

    async fn rewrite<F>(&self, key: &IdempotencyKey, apply: F) -> Result<(), IdempotencyError>
    where
        F: FnOnce(&mut IdempotencyRecord) + Send,
    {
        let storage_key = key.storage_key();
        let mut record = self.read(&storage_key).await?.ok_or_else(|| {
            IdempotencyError::Unavailable(format!("record {storage_key} expired or missing"))
        })?;
        apply(&mut record);

        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&storage_key)
            .arg(encode(&record)?)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable(&e))?;
        if reply.is_none() {
            return Err(IdempotencyError::Unavailable(format!(
                "record {storage_key} expired during update"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        self.read(&key.storage_key()).await
    }

    async fn try_begin(
        &self,
        key: &IdempotencyKey,
        ttl_secs: u64,
    ) -> Result<BeginOutcome, IdempotencyError> {
        let storage_key = key.storage_key();
        let ttl = ttl_secs.clamp(1, MAX_TTL_SECS);
        let record = IdempotencyRecord::pending(storage_key.clone(), key.user_id().clone(), ttl);
        let payload = encode(&record)?;

        // A record can expire between a refused SET NX and the GET; one retry covers it.
        for _ in 0..2 {
            let mut conn = self.connection.clone();
            let reply: Option<String> = redis::cmd("SET")
                .arg(&storage_key)
                .arg(&payload)
                .arg("NX")
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable(&e))?;
            if reply.is_some() {
                return Ok(BeginOutcome::Started(record));
            }
            if let Some(existing) = self.read(&storage_key).await? {
                return Ok(BeginOutcome::Existing(existing));
            }
            debug!(key = %storage_key, "idempotency record vanished between SET NX and GET");
        }
        Err(IdempotencyError::Unavailable(format!(
            "could not claim {storage_key}"
        )))
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        order_id: &OrderId,
    ) -> Result<(), IdempotencyError> {
        let order_id = order_id.clone();
        self.rewrite(key, move |record| record.complete(order_id))
            .await
    }

    async fn fail(
        &self,
        key: &IdempotencyKey,
        failure: &RecordedFailure,
    ) -> Result<(), IdempotencyError> {
        let failure = failure.clone();
        self.rewrite(key, move |record| record.fail(failure)).await
    }
}
