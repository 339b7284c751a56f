//! Quantity value object for order quantities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Decimal places kept when a quantity takes part in a request fingerprint.
pub const FINGERPRINT_QUANTITY_SCALE: u32 = 8;

/// A quantity for orders (shares, possibly fractional).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity from a Decimal.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a Quantity from an integer.
    #[must_use]
    pub fn from_i64(amount: i64) -> Self {
        Self(Decimal::new(amount, 0))
    }

    /// Get the inner Decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if this quantity is positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Canonical representation used by request fingerprints (8 places).
    #[must_use]
    pub fn fingerprint_repr(&self) -> String {
        self.0
            .round_dp(FINGERPRINT_QUANTITY_SCALE)
            .normalize()
            .to_string()
    }

    /// Validate quantity for order submission.
    ///
    /// # Errors
    ///
    /// Returns error if quantity is zero or negative.
    pub fn validate_for_order(&self) -> Result<(), DomainError> {
        if !self.is_positive() {
            return Err(DomainError::InvalidValue {
                field: "quantity".to_string(),
                message: "Order quantity must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantity_must_be_positive() {
        assert!(Quantity::from_i64(10).validate_for_order().is_ok());
        assert!(Quantity::from_i64(0).validate_for_order().is_err());
        assert!(Quantity::from_i64(-5).validate_for_order().is_err());
    }

    #[test]
    fn fractional_quantity_is_allowed() {
        assert!(Quantity::new(dec!(0.25)).validate_for_order().is_ok());
    }

    #[test]
    fn fingerprint_repr_rounds_to_eight_places() {
        assert_eq!(
            Quantity::new(dec!(1.123456789)).fingerprint_repr(),
            "1.12345679"
        );
        assert_eq!(Quantity::new(dec!(10.000)).fingerprint_repr(), "10");
    }
}
