//! Order status in the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::shared::DomainError;

/// Order status.
///
/// `PENDING` is the initial state. `EXECUTED`, `CANCELLED`, `FAILED`
/// and `REJECTED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted and queued, waiting for a worker.
    Pending,
    /// Owned by a worker that is executing it.
    Processing,
    /// Executed at a recorded price.
    Executed,
    /// Cancelled at the user's (or an operator's) request.
    Cancelled,
    /// Execution failed permanently.
    Failed,
    /// Rejected after acceptance.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Cancelled | Self::Failed | Self::Rejected
        )
    }

    /// Returns true if the order can still be cancelled.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Human-readable description used by status queries.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Pending => "Order is queued for processing",
            Self::Processing => "Order is being processed",
            Self::Executed => "Order has been executed",
            Self::Cancelled => "Order has been cancelled",
            Self::Failed => "Order processing failed",
            Self::Rejected => "Order was rejected",
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Executed => "EXECUTED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "EXECUTED" => Ok(Self::Executed),
            "CANCELLED" => Ok(Self::Cancelled),
            "FAILED" => Ok(Self::Failed),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(DomainError::UnknownVariant {
                kind: "OrderStatus",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_is_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Executed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn order_status_can_cancel() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Executed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn order_status_parse_matches_display() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Executed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
            OrderStatus::Rejected,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
    }

    #[test]
    fn order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
    }
}
