//! In-memory idempotency store for testing and development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::idempotency::{
    BeginOutcome, IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore,
    RecordedFailure,
};
use crate::domain::shared::{OrderId, Timestamp};

/// Map size below which `try_begin` never sweeps.
const SWEEP_FLOOR: usize = 64;

#[derive(Debug)]
struct Records {
    by_key: HashMap<String, IdempotencyRecord>,
    /// Size at which the next insert sweeps expired records.
    sweep_at: usize,
}

impl Default for Records {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            sweep_at: SWEEP_FLOOR,
        }
    }
}

impl Records {
    /// Drop expired records once the map has doubled since the last sweep,
    /// keeping the cost amortised over inserts.
    fn sweep_if_due(&mut self, now: Timestamp) {
        if self.by_key.len() < self.sweep_at {
            return;
        }
        self.by_key.retain(|_, record| !record.is_expired_at(now));
        self.sweep_at = (self.by_key.len() * 2).max(SWEEP_FLOOR);
    }
}

/// Process-local TTL map of idempotency records.
///
/// Expired records read as absent and are swept as the map grows.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: Mutex<Records>,
}

impl InMemoryIdempotencyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Timestamp::now();
        self.records
            .lock()
            .by_key
            .values()
            .filter(|r| !r.is_expired_at(now))
            .count()
    }

    /// Check if no live record exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<F>(&self, key: &IdempotencyKey, apply: F) -> Result<(), IdempotencyError>
    where
        F: FnOnce(&mut IdempotencyRecord),
    {
        let storage_key = key.storage_key();
        let mut records = self.records.lock();
        match records.by_key.get_mut(&storage_key) {
            Some(record) if !record.is_expired_at(Timestamp::now()) => {
                apply(record);
                Ok(())
            }
            _ => {
                records.by_key.remove(&storage_key);
                Err(IdempotencyError::Unavailable(format!(
                    "record {storage_key} expired or missing"
                )))
            }
        }
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let storage_key = key.storage_key();
        let mut records = self.records.lock();
        match records.by_key.get(&storage_key) {
            Some(record) if record.is_expired_at(Timestamp::now()) => {
                records.by_key.remove(&storage_key);
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    async fn try_begin(
        &self,
        key: &IdempotencyKey,
        ttl_secs: u64,
    ) -> Result<BeginOutcome, IdempotencyError> {
        let storage_key = key.storage_key();
        let now = Timestamp::now();
        let mut records = self.records.lock();
        if let Some(existing) = records.by_key.get(&storage_key) {
            if !existing.is_expired_at(now) {
                return Ok(BeginOutcome::Existing(existing.clone()));
            }
        }
        records.sweep_if_due(now);
        let record = IdempotencyRecord::pending(storage_key.clone(), key.user_id().clone(), ttl_secs);
        records.by_key.insert(storage_key, record.clone());
        Ok(BeginOutcome::Started(record))
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        order_id: &OrderId,
    ) -> Result<(), IdempotencyError> {
        self.update(key, |record| record.complete(order_id.clone()))
    }

    async fn fail(
        &self,
        key: &IdempotencyKey,
        failure: &RecordedFailure,
    ) -> Result<(), IdempotencyError> {
        self.update(key, |record| record.fail(failure.clone()))
    }
}
