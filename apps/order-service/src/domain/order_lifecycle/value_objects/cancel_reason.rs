//! Cancellation reasons.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Why an order was cancelled.
///
/// The well-known reasons are enumerated; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CancelReason {
    /// The user asked for it.
    #[default]
    UserRequested,
    /// The market closed before execution.
    MarketClosed,
    /// The account could not cover the order.
    InsufficientFunds,
    /// Risk management pulled the order.
    RiskManagement,
    /// Internal system error.
    SystemError,
    /// The order expired.
    Expired,
    /// An operator cancelled it.
    AdminAction,
    /// Free-form reason supplied by the caller.
    Other(String),
}

impl CancelReason {
    /// Parse a reason string; blank input yields the default.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" | "USER_REQUESTED" => Self::UserRequested,
            "MARKET_CLOSED" => Self::MarketClosed,
            "INSUFFICIENT_FUNDS" => Self::InsufficientFunds,
            "RISK_MANAGEMENT" => Self::RiskManagement,
            "SYSTEM_ERROR" => Self::SystemError,
            "EXPIRED" => Self::Expired,
            "ADMIN_ACTION" => Self::AdminAction,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserRequested => "USER_REQUESTED",
            Self::MarketClosed => "MARKET_CLOSED",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::RiskManagement => "RISK_MANAGEMENT",
            Self::SystemError => "SYSTEM_ERROR",
            Self::Expired => "EXPIRED",
            Self::AdminAction => "ADMIN_ACTION",
            Self::Other(reason) => reason,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CancelReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CancelReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
