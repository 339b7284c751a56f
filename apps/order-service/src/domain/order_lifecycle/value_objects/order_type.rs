//! Order type (market, limit, stop-loss, stop-limit).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::shared::DomainError;

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - execute at the best available price.
    Market,
    /// Limit order - execute at the specified price or better.
    Limit,
    /// Stop-loss order - becomes a market order once the stop price is reached.
    StopLoss,
    /// Stop-limit order - becomes a limit order once the stop price is reached.
    StopLimit,
}

impl OrderType {
    /// Returns true if this order type must carry a price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        !matches!(self, Self::Market)
    }

    /// Returns true if the order's price is a limit price.
    ///
    /// Only these types are subject to the submission price band.
    #[must_use]
    pub const fn has_limit_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLimit => "STOP_LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            "STOP_LOSS" => Ok(Self::StopLoss),
            "STOP_LIMIT" => Ok(Self::StopLimit),
            _ => Err(DomainError::UnknownVariant {
                kind: "OrderType",
                value: s.to_string(),
            }),
        }
    }
}
