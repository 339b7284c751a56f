//! HTTP request bodies and query parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::dto::{OrderHistoryRequestDto, SubmitOrderDto};
use crate::domain::order_lifecycle::{CancelReason, HistoryQuery, SortField, SortOrder};
use crate::domain::shared::UserId;
use crate::error::ServiceError;

/// Body of `POST /orders`.
///
/// Enumerations stay strings here so bad values surface as `VALIDATION`
/// rather than a generic JSON rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Ticker symbol.
    pub symbol: String,
    /// BUY or SELL.
    pub side: String,
    /// MARKET, LIMIT, STOP_LOSS or STOP_LIMIT.
    #[serde(alias = "type")]
    pub order_type: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit or stop price.
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl SubmitOrderRequest {
    /// Attach the authenticated user.
    #[must_use]
    pub fn into_dto(self, user_id: UserId) -> SubmitOrderDto {
        SubmitOrderDto {
            user_id,
            symbol: self.symbol,
            side: self.side,
            order_type: self.order_type,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// Optional body of `PUT /orders/{id}/cancel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    /// Reason code or free text; defaults to USER_REQUESTED.
    #[serde(default)]
    pub reason: Option<String>,
}

impl CancelOrderRequest {
    /// Parsed reason.
    #[must_use]
    pub fn reason(&self) -> CancelReason {
        self.reason
            .as_deref()
            .map(CancelReason::parse)
            .unwrap_or_default()
    }
}

/// Query string of `GET /orders/history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryParams {
    /// 1-based page.
    #[serde(default)]
    pub page: Option<i64>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<i64>,
    /// created_at, updated_at, symbol or status.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// asc or desc.
    #[serde(default)]
    pub sort_order: Option<String>,
}

impl HistoryParams {
    /// Translate page numbers into an offset for the user's history.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION` for unknown sort columns or directions.
    pub fn into_dto(self, user_id: UserId) -> Result<OrderHistoryRequestDto, ServiceError> {
        let sort_by = match self.sort_by.as_deref() {
            Some(s) => s.parse::<SortField>()?,
            None => SortField::default(),
        };
        let sort_order = match self.sort_order.as_deref() {
            Some(s) => s.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };
        let limit = self.limit.unwrap_or(0);
        let effective = HistoryQuery::new(limit, 0, sort_by, sort_order).limit();
        let page = self.page.unwrap_or(1).max(1);

        Ok(OrderHistoryRequestDto {
            user_id,
            limit,
            offset: (page - 1).saturating_mul(i64::from(effective)),
            sort_by,
            sort_order,
        })
    }
}
