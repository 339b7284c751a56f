//! Idempotency store port.

use async_trait::async_trait;
use thiserror::Error;

use super::fingerprint::IdempotencyKey;
use super::record::{IdempotencyRecord, RecordedFailure};
use crate::domain::shared::OrderId;

/// Errors raised by idempotency stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyError {
    /// The store cannot be reached or refused the write.
    #[error("Idempotency store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("Corrupt idempotency record {key}: {message}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// Decode failure.
        message: String,
    },
}

/// Outcome of an insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// No live record existed; a PENDING one was written.
    Started(IdempotencyRecord),
    /// A live record already exists; nothing was written.
    Existing(IdempotencyRecord),
}

/// TTL key/value store of submission outcomes.
///
/// Records are isolated per key; expired records behave as absent.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Read the live record for a key.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, IdempotencyError>;

    /// Atomically write a PENDING record unless a live one exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn try_begin(
        &self,
        key: &IdempotencyKey,
        ttl_secs: u64,
    ) -> Result<BeginOutcome, IdempotencyError>;

    /// Mark the record COMPLETED with the order ID, keeping its expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is gone.
    async fn complete(&self, key: &IdempotencyKey, order_id: &OrderId)
    -> Result<(), IdempotencyError>;

    /// Mark the record FAILED with the surfaced error, keeping its expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is gone.
    async fn fail(
        &self,
        key: &IdempotencyKey,
        failure: &RecordedFailure,
    ) -> Result<(), IdempotencyError>;
}
