//! Idempotency Bounded Context
//!
//! Deduplicates order submissions by a fingerprint of their inputs.

pub mod fingerprint;
pub mod record;
pub mod store;

pub use fingerprint::{Fingerprint, IdempotencyKey};
pub use record::{IdempotencyRecord, IdempotencyStatus, MAX_TTL_SECS, RecordedFailure};
pub use store::{BeginOutcome, IdempotencyError, IdempotencyStore};
