//! Symbol value object for instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Longest ticker accepted at the boundary.
pub const MAX_SYMBOL_LEN: usize = 12;

/// A trading symbol (equity ticker).
///
/// Input is matched case-insensitively and always stored uppercase, so
/// `"aapl"` and `"AAPL"` are the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol without validation.
    ///
    /// The value is trimmed and normalized to uppercase.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_uppercase())
    }

    /// Parse and validate a symbol from user input.
    ///
    /// # Errors
    ///
    /// Returns error if the symbol is empty, too long, or contains
    /// characters other than ASCII letters, digits, `.` and `-`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let symbol = Self::new(value);
        if symbol.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol must not be empty".to_string(),
            });
        }
        if symbol.0.len() > MAX_SYMBOL_LEN {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("Symbol longer than {MAX_SYMBOL_LEN} characters"),
            });
        }
        if !symbol
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("Symbol '{}' contains invalid characters", symbol.0),
            });
        }
        Ok(symbol)
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_normalized_to_uppercase() {
        assert_eq!(Symbol::new("aapl").as_str(), "AAPL");
        assert_eq!(Symbol::new("  msft ").as_str(), "MSFT");
    }

    #[test]
    fn symbol_parse_accepts_share_classes() {
        assert_eq!(Symbol::parse("brk.b").unwrap().as_str(), "BRK.B");
    }

    #[test]
    fn symbol_parse_rejects_empty() {
        assert!(Symbol::parse("   ").is_err());
    }

    #[test]
    fn symbol_parse_rejects_invalid_characters() {
        assert!(Symbol::parse("AA PL").is_err());
        assert!(Symbol::parse("AAPL$").is_err());
    }

    #[test]
    fn symbol_parse_rejects_too_long() {
        assert!(Symbol::parse("ABCDEFGHIJKLM").is_err());
    }

    #[test]
    fn symbol_case_insensitive_equality() {
        assert_eq!(Symbol::new("tsla"), Symbol::new("TSLA"));
    }
}
