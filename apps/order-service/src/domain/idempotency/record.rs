//! Idempotency records.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{OrderId, Timestamp, UserId};

/// Longest lifetime a record may have (24h).
pub const MAX_TTL_SECS: u64 = 86_400;

/// Where a submission got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    /// Submission in flight.
    Pending,
    /// Order accepted; `order_id` is set.
    Completed,
    /// Submission failed; `error` is set.
    Failed,
}

/// The error a failed submission surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFailure {
    /// Stable error code.
    pub code: String,
    /// Message surfaced to the caller.
    pub message: String,
}

/// A stored submission outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Storage key.
    pub key: String,
    /// Owning user.
    pub user_id: UserId,
    /// Current status.
    pub status: IdempotencyStatus,
    /// Order created by the submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    /// Failure surfaced by the submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordedFailure>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Eviction time.
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    /// A fresh PENDING record living for `ttl_secs` (capped at 24h).
    #[must_use]
    pub fn pending(key: String, user_id: UserId, ttl_secs: u64) -> Self {
        let now = Timestamp::now();
        let ttl = i64::try_from(ttl_secs.min(MAX_TTL_SECS)).unwrap_or(0);
        Self {
            key,
            user_id,
            status: IdempotencyStatus::Pending,
            order_id: None,
            error: None,
            created_at: now,
            expires_at: now.plus_seconds(ttl),
        }
    }

    /// Returns true once `now` has reached `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Mark completed with the order ID.
    pub fn complete(&mut self, order_id: OrderId) {
        self.status = IdempotencyStatus::Completed;
        self.order_id = Some(order_id);
        self.error = None;
    }

    /// Mark failed with the surfaced error.
    pub fn fail(&mut self, failure: RecordedFailure) {
        self.status = IdempotencyStatus::Failed;
        self.error = Some(failure);
    }

    /// Seconds left before eviction, floored at zero.
    #[must_use]
    pub fn remaining_ttl_secs(&self, now: Timestamp) -> u64 {
        u64::try_from(self.expires_at.millis_since(&now) / 1000).unwrap_or(0)
    }
}
