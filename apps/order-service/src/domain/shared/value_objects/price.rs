//! Price value object for per-unit prices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Decimal places kept when a price takes part in a request fingerprint.
pub const FINGERPRINT_PRICE_SCALE: u32 = 4;

/// A per-unit price in the account currency.
///
/// Represented as a Decimal for precise financial calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Get the inner Decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if this price is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Canonical representation used by request fingerprints.
    ///
    /// Rounded to four decimal places with trailing zeros removed, so
    /// `150.5` and `150.50000` fingerprint identically.
    #[must_use]
    pub fn fingerprint_repr(&self) -> String {
        self.0
            .round_dp(FINGERPRINT_PRICE_SCALE)
            .normalize()
            .to_string()
    }

    /// Validate the price for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the price is zero or negative.
    pub fn validate_for_order(&self) -> Result<(), DomainError> {
        if !self.is_positive() {
            return Err(DomainError::InvalidValue {
                field: "price".to_string(),
                message: "Order price must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}
