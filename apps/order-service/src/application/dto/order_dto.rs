//! Order DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_lifecycle::{
    CancelReason, Order, OrderSide, OrderStatus, OrderType, SortField, SortOrder,
};
use crate::domain::shared::{OrderId, Timestamp, UserId};

/// Reply message for freshly accepted orders.
pub const ACCEPTED_MESSAGE: &str = "Order accepted for processing";
/// Reply message for idempotent replays.
pub const REPLAY_MESSAGE: &str = "idempotent replay";

/// Raw submission as received at the edge.
///
/// Enumerations stay strings here so that illegal values surface as
/// `VALIDATION` errors from the use case rather than as decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderDto {
    /// Authenticated user.
    pub user_id: UserId,
    /// Symbol (any case).
    pub symbol: String,
    /// `BUY` or `SELL`.
    pub side: String,
    /// `MARKET`, `LIMIT`, `STOP_LOSS` or `STOP_LIMIT`.
    pub order_type: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Price (absent for market orders).
    pub price: Option<Decimal>,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderResultDto {
    /// Order ID (the original one on replay).
    pub order_id: OrderId,
    /// Always PENDING at submission time.
    pub status: OrderStatus,
    /// Human-readable note.
    pub message: String,
    /// Price the order is expected to execute at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<Decimal>,
    /// Market price at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_price: Option<Decimal>,
    /// Submission time.
    pub submitted_at: Timestamp,
    /// True if this answer is an idempotent replay.
    #[serde(skip)]
    pub replayed: bool,
}

/// Full order details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetailsDto {
    /// Order ID.
    pub order_id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: OrderSide,
    /// Type.
    pub order_type: OrderType,
    /// Quantity.
    pub quantity: Decimal,
    /// Price.
    pub price: Option<Decimal>,
    /// Status.
    pub status: OrderStatus,
    /// Human status description.
    pub status_description: String,
    /// Whether the order can still be cancelled.
    pub can_cancel: bool,
    /// Created at.
    pub created_at: Timestamp,
    /// Updated at.
    pub updated_at: Timestamp,
    /// Executed at.
    pub executed_at: Option<Timestamp>,
    /// Execution price.
    pub execution_price: Option<Decimal>,
    /// Market price at submission.
    pub market_price_at_submission: Option<Decimal>,
    /// Market data timestamp.
    pub market_data_timestamp: Option<Timestamp>,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Cancellation reason.
    pub cancel_reason: Option<CancelReason>,
}

impl OrderDetailsDto {
    /// Create from domain Order.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id().clone(),
            user_id: order.user_id().clone(),
            symbol: order.symbol().to_string(),
            side: order.side(),
            order_type: order.order_type(),
            quantity: order.quantity().amount(),
            price: order.price().map(|p| p.amount()),
            status: order.status(),
            status_description: order.status().description().to_string(),
            can_cancel: order.can_cancel(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            executed_at: order.executed_at(),
            execution_price: order.execution_price().map(|p| p.amount()),
            market_price_at_submission: order.market_price_at_submission().map(|p| p.amount()),
            market_data_timestamp: order.market_data_timestamp(),
            failure_reason: order.failure_reason().map(str::to_string),
            cancel_reason: order.cancel_reason().cloned(),
        }
    }
}

/// Status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusDto {
    /// Order ID.
    pub order_id: OrderId,
    /// Status.
    pub status: OrderStatus,
    /// Human status description.
    pub message: String,
    /// Updated at.
    pub updated_at: Timestamp,
    /// Whether the order can still be cancelled.
    pub can_cancel: bool,
}

impl OrderStatusDto {
    /// Create from domain Order.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id().clone(),
            status: order.status(),
            message: order.status().description().to_string(),
            updated_at: order.updated_at(),
            can_cancel: order.can_cancel(),
        }
    }
}

/// Raw history request; clamped by the use case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHistoryRequestDto {
    /// Authenticated user.
    pub user_id: UserId,
    /// Page size.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
    /// Sort column.
    pub sort_by: SortField,
    /// Sort direction.
    pub sort_order: SortOrder,
}

/// One page of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistoryDto {
    /// Orders on this page.
    pub orders: Vec<OrderDetailsDto>,
    /// Total orders the user has.
    pub total: u64,
    /// 1-based page number.
    pub page: u64,
    /// Effective page size.
    pub limit: u32,
    /// Whether more pages follow.
    pub has_more: bool,
}

/// Outcome of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderResultDto {
    /// Order ID.
    pub order_id: OrderId,
    /// Always CANCELLED.
    pub status: OrderStatus,
    /// Reason recorded.
    pub reason: CancelReason,
    /// Human-readable note.
    pub message: String,
    /// Cancellation time.
    pub cancelled_at: Timestamp,
}
