//! Order State Machine Service
//!
//! Single source of truth for which status changes are legal. Every status
//! write in the system goes through a [`StatusTransition`] or an
//! [`ExecutionRecord`], both of which can only be obtained here.

use crate::domain::order_lifecycle::errors::OrderError;
use crate::domain::order_lifecycle::value_objects::{CancelReason, OrderStatus};
use crate::domain::shared::{Price, Timestamp};

/// A status change already checked against the lifecycle table.
///
/// Repositories apply it as a compare-and-set on `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    from: OrderStatus,
    to: OrderStatus,
    at: Timestamp,
    failure_reason: Option<String>,
    cancel_reason: Option<CancelReason>,
}

impl StatusTransition {
    /// Expected current status.
    #[must_use]
    pub const fn from(&self) -> OrderStatus {
        self.from
    }

    /// Target status.
    #[must_use]
    pub const fn to(&self) -> OrderStatus {
        self.to
    }

    /// When the transition was decided.
    #[must_use]
    pub const fn at(&self) -> Timestamp {
        self.at
    }

    /// Failure reason recorded with FAILED/REJECTED targets.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Cancellation reason recorded with CANCELLED targets.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }

    /// Attach a failure reason. Ignored unless the target is FAILED or REJECTED.
    #[must_use]
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        if matches!(self.to, OrderStatus::Failed | OrderStatus::Rejected) {
            self.failure_reason = Some(reason.into());
        }
        self
    }

    /// Attach a cancellation reason. Ignored unless the target is CANCELLED.
    #[must_use]
    pub fn with_cancel_reason(mut self, reason: CancelReason) -> Self {
        if self.to == OrderStatus::Cancelled {
            self.cancel_reason = Some(reason);
        }
        self
    }
}

/// The PROCESSING -> EXECUTED transition together with its execution fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    price: Price,
    executed_at: Timestamp,
}

impl ExecutionRecord {
    /// Execution price.
    #[must_use]
    pub const fn price(&self) -> Price {
        self.price
    }

    /// Execution time.
    #[must_use]
    pub const fn executed_at(&self) -> Timestamp {
        self.executed_at
    }
}

/// Order State Machine for validating transitions.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (
                OrderStatus::Pending,
                OrderStatus::Processing | OrderStatus::Cancelled | OrderStatus::Rejected
            ) | (
                OrderStatus::Processing,
                OrderStatus::Executed
                    | OrderStatus::Failed
                    | OrderStatus::Pending
                    | OrderStatus::Cancelled
            )
        )
    }

    /// Validate a state transition.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTransition` if the transition is not in the table.
    pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(OrderError::IllegalTransition {
                from,
                to,
                reason: Self::transition_error_reason(from, to),
            })
        }
    }

    /// Build a status-only transition.
    ///
    /// EXECUTED is reached through [`Self::execute`] instead, because it
    /// must carry execution fields.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTransition` for transitions outside the table or
    /// targeting EXECUTED.
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<StatusTransition, OrderError> {
        Self::validate_transition(from, to)?;
        if to == OrderStatus::Executed {
            return Err(OrderError::IllegalTransition {
                from,
                to,
                reason: "Execution must record price and time".to_string(),
            });
        }
        Ok(StatusTransition {
            from,
            to,
            at: Timestamp::now(),
            failure_reason: None,
            cancel_reason: None,
        })
    }

    /// Build the PROCESSING -> EXECUTED transition.
    #[must_use]
    pub const fn execute(price: Price, executed_at: Timestamp) -> ExecutionRecord {
        ExecutionRecord { price, executed_at }
    }

    /// Get a human-readable reason for an invalid transition.
    #[must_use]
    pub fn transition_error_reason(from: OrderStatus, to: OrderStatus) -> String {
        match from {
            OrderStatus::Executed => format!("Order is already executed, cannot transition to {to}"),
            OrderStatus::Cancelled => format!("Order is cancelled, cannot transition to {to}"),
            OrderStatus::Failed => format!("Order has failed, cannot transition to {to}"),
            OrderStatus::Rejected => format!("Order was rejected, cannot transition to {to}"),
            _ => format!("Invalid transition from {from} to {to}"),
        }
    }

    /// Get all valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: OrderStatus) -> Vec<OrderStatus> {
        match from {
            OrderStatus::Pending => vec![
                OrderStatus::Processing,
                OrderStatus::Cancelled,
                OrderStatus::Rejected,
            ],
            OrderStatus::Processing => vec![
                OrderStatus::Executed,
                OrderStatus::Failed,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
            ],
            // Terminal states
            OrderStatus::Executed
            | OrderStatus::Cancelled
            | OrderStatus::Failed
            | OrderStatus::Rejected => vec![],
        }
    }
}
