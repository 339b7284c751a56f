//! Domain errors shared by value objects and aggregates.

use std::fmt;

/// Domain-level errors that can occur in business logic.
///
/// These errors are independent of infrastructure concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid value for a field.
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },

    /// Unknown variant for a closed enumeration.
    UnknownVariant {
        /// Enumeration name (e.g., "OrderSide").
        kind: &'static str,
        /// Value that failed to parse.
        value: String,
    },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{field}': {message}")
            }
            Self::UnknownVariant { kind, value } => {
                write!(f, "Unknown {kind}: '{value}'")
            }
        }
    }
}

impl std::error::Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_invalid_value_display() {
        let err = DomainError::InvalidValue {
            field: "quantity".to_string(),
            message: "must be positive".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("quantity"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn domain_error_unknown_variant_display() {
        let err = DomainError::UnknownVariant {
            kind: "OrderSide",
            value: "HOLD".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown OrderSide: 'HOLD'");
    }
}
