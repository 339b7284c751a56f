//! Order lifecycle errors.

use thiserror::Error;

use super::value_objects::OrderStatus;

/// Errors raised by the order aggregate and its domain services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Transition not present in the lifecycle table.
    #[error("Illegal order state transition: {from} -> {to}: {reason}")]
    IllegalTransition {
        /// Current order status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
        /// Reason for failure.
        reason: String,
    },

    /// Transition was built for a different prior status than the order has.
    #[error("Order status is {actual}, transition expects {expected}")]
    StatusMismatch {
        /// Status the transition was built from.
        expected: OrderStatus,
        /// Status the order actually has.
        actual: OrderStatus,
    },

    /// Invalid order parameters.
    #[error("Invalid order parameter '{field}': {message}")]
    InvalidParameters {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },

    /// Limit price outside the accepted band around the market price.
    #[error("Price {price} out of range for market price {market_price}: {reason}")]
    PriceOutOfRange {
        /// Requested limit price.
        price: String,
        /// Market price at submission.
        market_price: String,
        /// Which band was violated.
        reason: String,
    },

    /// Aggregate invariant violated.
    #[error("Order invariant violated: {invariant}")]
    InvariantViolation {
        /// Invariant description.
        invariant: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_transition_display() {
        let err = OrderError::IllegalTransition {
            from: OrderStatus::Executed,
            to: OrderStatus::Pending,
            reason: "terminal".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("EXECUTED"));
        assert!(msg.contains("PENDING"));
    }

    #[test]
    fn price_out_of_range_display() {
        let err = OrderError::PriceOutOfRange {
            price: "200".to_string(),
            market_price: "150".to_string(),
            reason: "deviation".to_string(),
        };
        assert!(err.to_string().contains("200"));
    }
}
