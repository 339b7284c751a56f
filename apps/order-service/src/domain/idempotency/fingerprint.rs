//! Deterministic request fingerprints.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::order_lifecycle::{OrderSide, OrderType};
use crate::domain::shared::{Price, Quantity, Symbol, UserId};

/// Key prefix shared by every idempotency entry.
pub const KEY_PREFIX: &str = "idempotency";

/// SHA-256 hex digest of the canonical submission inputs.
///
/// Symbols compare case-insensitively, prices are rounded to 4 places and
/// quantities to 8, so requests that differ only in those respects collide
/// on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a submission.
    #[must_use]
    pub fn compute(
        user_id: &UserId,
        symbol: &Symbol,
        order_type: OrderType,
        side: OrderSide,
        quantity: Quantity,
        price: Option<Price>,
    ) -> Self {
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}",
            user_id.as_str(),
            symbol.as_str().to_uppercase(),
            order_type.as_str(),
            side.as_str(),
            quantity.fingerprint_repr(),
            price.map_or_else(|| "-".to_string(), |p| p.fingerprint_repr()),
        );
        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(digest))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fingerprint scoped to its user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    user_id: UserId,
    fingerprint: Fingerprint,
}

impl IdempotencyKey {
    /// Scope a fingerprint to a user.
    #[must_use]
    pub const fn new(user_id: UserId, fingerprint: Fingerprint) -> Self {
        Self {
            user_id,
            fingerprint,
        }
    }

    /// Owning user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Storage key: `idempotency:{user_id}:{fingerprint}`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!(
            "{KEY_PREFIX}:{}:{}",
            self.user_id.as_str(),
            self.fingerprint.as_str()
        )
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
