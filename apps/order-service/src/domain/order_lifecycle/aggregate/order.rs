//! Order Aggregate Root
//!
//! The Order aggregate owns its invariants. Status changes arrive as
//! [`StatusTransition`]s or an [`ExecutionRecord`] minted by the
//! [`OrderStateMachine`](crate::domain::order_lifecycle::OrderStateMachine).

use serde::{Deserialize, Serialize};

use crate::domain::order_lifecycle::errors::OrderError;
use crate::domain::order_lifecycle::services::{ExecutionRecord, StatusTransition};
use crate::domain::order_lifecycle::value_objects::{
    CancelReason, OrderSide, OrderStatus, OrderType,
};
use crate::domain::shared::{OrderId, Price, Quantity, Symbol, Timestamp, UserId};

/// Parameters for reconstituting an Order from storage.
///
/// Used by repositories to rebuild aggregates from persisted state.
#[derive(Debug, Clone)]
pub struct ReconstitutedOrderParams {
    /// Order identifier.
    pub order_id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Symbol being traded.
    pub symbol: Symbol,
    /// Order side (buy/sell).
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity.
    pub quantity: Quantity,
    /// Limit or stop price.
    pub price: Option<Price>,
    /// Current order status.
    pub status: OrderStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
    /// Execution timestamp.
    pub executed_at: Option<Timestamp>,
    /// Execution price.
    pub execution_price: Option<Price>,
    /// Market price observed at submission.
    pub market_price_at_submission: Option<Price>,
    /// When the market data was observed.
    pub market_data_timestamp: Option<Timestamp>,
    /// Why the order failed or was rejected.
    pub failure_reason: Option<String>,
    /// Why the order was cancelled.
    pub cancel_reason: Option<CancelReason>,
}

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    /// Owning user.
    pub user_id: UserId,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity to trade.
    pub quantity: Quantity,
    /// Price (required for every type except MARKET).
    pub price: Option<Price>,
}

impl CreateOrderCommand {
    /// Validate the command parameters.
    ///
    /// # Errors
    ///
    /// Returns error if required parameters are missing or invalid.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.is_blank() {
            return Err(OrderError::InvalidParameters {
                field: "user_id".to_string(),
                message: "User ID must not be empty".to_string(),
            });
        }

        if self.symbol.as_str().is_empty() {
            return Err(OrderError::InvalidParameters {
                field: "symbol".to_string(),
                message: "Symbol must not be empty".to_string(),
            });
        }

        self.quantity
            .validate_for_order()
            .map_err(|e| OrderError::InvalidParameters {
                field: "quantity".to_string(),
                message: e.to_string(),
            })?;

        match (self.order_type.requires_price(), &self.price) {
            (true, None) => Err(OrderError::InvalidParameters {
                field: "price".to_string(),
                message: format!("Price required for {} orders", self.order_type),
            }),
            (false, Some(_)) => Err(OrderError::InvalidParameters {
                field: "price".to_string(),
                message: "Market orders must not carry a price".to_string(),
            }),
            (true, Some(price)) => {
                price
                    .validate_for_order()
                    .map_err(|e| OrderError::InvalidParameters {
                        field: "price".to_string(),
                        message: e.to_string(),
                    })
            }
            (false, None) => Ok(()),
        }
    }
}

/// Order Aggregate Root.
// `order_type` mirrors the wire field name; `type` is a keyword.
#[allow(clippy::struct_field_names)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    order_id: OrderId,
    user_id: UserId,
    symbol: Symbol,
    side: OrderSide,
    order_type: OrderType,
    quantity: Quantity,
    price: Option<Price>,
    status: OrderStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
    executed_at: Option<Timestamp>,
    execution_price: Option<Price>,
    market_price_at_submission: Option<Price>,
    market_data_timestamp: Option<Timestamp>,
    failure_reason: Option<String>,
    cancel_reason: Option<CancelReason>,
}

impl Order {
    /// Create a new PENDING order from a command.
    ///
    /// # Errors
    ///
    /// Returns error if command validation fails.
    pub fn new(cmd: CreateOrderCommand) -> Result<Self, OrderError> {
        cmd.validate()?;
        let now = Timestamp::now();

        Ok(Self {
            order_id: OrderId::generate(),
            user_id: cmd.user_id,
            symbol: cmd.symbol,
            side: cmd.side,
            order_type: cmd.order_type,
            quantity: cmd.quantity,
            price: cmd.price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            executed_at: None,
            execution_price: None,
            market_price_at_submission: None,
            market_data_timestamp: None,
            failure_reason: None,
            cancel_reason: None,
        })
    }

    /// Reconstitute an order from storage.
    #[must_use]
    pub fn reconstitute(params: ReconstitutedOrderParams) -> Self {
        Self {
            order_id: params.order_id,
            user_id: params.user_id,
            symbol: params.symbol,
            side: params.side,
            order_type: params.order_type,
            quantity: params.quantity,
            price: params.price,
            status: params.status,
            created_at: params.created_at,
            updated_at: params.updated_at,
            executed_at: params.executed_at,
            execution_price: params.execution_price,
            market_price_at_submission: params.market_price_at_submission,
            market_data_timestamp: params.market_data_timestamp,
            failure_reason: params.failure_reason,
            cancel_reason: params.cancel_reason,
        }
    }

    /// Record the market snapshot the order was accepted against.
    pub fn record_market_snapshot(&mut self, market_price: Price, observed_at: Timestamp) {
        self.market_price_at_submission = Some(market_price);
        self.market_data_timestamp = Some(observed_at);
    }

    // ========================================================================
    // State Transitions
    // ========================================================================

    /// Apply a status transition.
    ///
    /// # Errors
    ///
    /// Returns `StatusMismatch` if the order is not in the transition's
    /// expected prior status.
    pub fn apply_transition(&mut self, transition: &StatusTransition) -> Result<(), OrderError> {
        if self.status != transition.from() {
            return Err(OrderError::StatusMismatch {
                expected: transition.from(),
                actual: self.status,
            });
        }
        self.status = transition.to();
        self.touch(transition.at());
        if let Some(reason) = transition.failure_reason() {
            self.failure_reason = Some(reason.to_string());
        }
        if let Some(reason) = transition.cancel_reason() {
            self.cancel_reason = Some(reason.clone());
        }
        Ok(())
    }

    /// Apply the PROCESSING -> EXECUTED transition.
    ///
    /// # Errors
    ///
    /// Returns `StatusMismatch` if the order is not PROCESSING.
    pub fn apply_execution(&mut self, execution: &ExecutionRecord) -> Result<(), OrderError> {
        if self.status != OrderStatus::Processing {
            return Err(OrderError::StatusMismatch {
                expected: OrderStatus::Processing,
                actual: self.status,
            });
        }
        self.status = OrderStatus::Executed;
        self.execution_price = Some(execution.price());
        self.executed_at = Some(execution.executed_at());
        self.touch(execution.executed_at());
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) {
        self.updated_at = self.updated_at.max(at);
    }

    /// Check every aggregate invariant.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` naming the first invariant that fails.
    pub fn validate_invariants(&self) -> Result<(), OrderError> {
        let violation = |invariant: &str| {
            Err(OrderError::InvariantViolation {
                invariant: invariant.to_string(),
            })
        };

        if !self.quantity.is_positive() {
            return violation("quantity > 0");
        }
        match (self.order_type.requires_price(), self.price) {
            (false, Some(_)) => return violation("MARKET orders carry no price"),
            (true, None) => return violation("non-MARKET orders carry a price"),
            (true, Some(p)) if !p.is_positive() => return violation("price > 0"),
            _ => {}
        }
        let executed = self.status == OrderStatus::Executed;
        if executed != self.executed_at.is_some() || executed != self.execution_price.is_some() {
            return violation("execution fields set iff EXECUTED");
        }
        if self.updated_at < self.created_at {
            return violation("updated_at >= created_at");
        }
        Ok(())
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Get order ID.
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Get owning user ID.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Get symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Get side.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Get order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Get quantity.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Get price.
    #[must_use]
    pub const fn price(&self) -> Option<Price> {
        self.price
    }

    /// Get status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Get creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Get last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Get execution timestamp.
    #[must_use]
    pub const fn executed_at(&self) -> Option<Timestamp> {
        self.executed_at
    }

    /// Get execution price.
    #[must_use]
    pub const fn execution_price(&self) -> Option<Price> {
        self.execution_price
    }

    /// Get market price at submission.
    #[must_use]
    pub const fn market_price_at_submission(&self) -> Option<Price> {
        self.market_price_at_submission
    }

    /// Get market data observation time.
    #[must_use]
    pub const fn market_data_timestamp(&self) -> Option<Timestamp> {
        self.market_data_timestamp
    }

    /// Get failure reason.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Get cancellation reason.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }

    /// Returns true if the order can still be cancelled.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.can_cancel()
    }
}
