//! Query Orders Use Case
//!
//! User-scoped reads. Orders belonging to someone else are reported as not
//! found so existence never leaks across users.

use std::sync::Arc;

use crate::application::dto::{
    OrderDetailsDto, OrderHistoryDto, OrderHistoryRequestDto, OrderStatusDto,
};
use crate::domain::order_lifecycle::{HistoryQuery, Order, OrderRepository};
use crate::domain::shared::{OrderId, UserId};
use crate::error::ServiceError;

/// Read side of the order lifecycle.
pub struct QueryOrdersUseCase<R>
where
    R: OrderRepository,
{
    orders: Arc<R>,
}

impl<R> QueryOrdersUseCase<R>
where
    R: OrderRepository,
{
    /// Create a new `QueryOrdersUseCase`.
    pub const fn new(orders: Arc<R>) -> Self {
        Self { orders }
    }

    /// Current status of an order.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the order does not exist or is not the user's.
    pub async fn status(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<OrderStatusDto, ServiceError> {
        let order = self.find_owned(order_id, user_id).await?;
        Ok(OrderStatusDto::from_order(&order))
    }

    /// Full details of an order.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the order does not exist or is not the user's.
    pub async fn details(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<OrderDetailsDto, ServiceError> {
        let order = self.find_owned(order_id, user_id).await?;
        Ok(OrderDetailsDto::from_order(&order))
    }

    /// One page of the user's history.
    ///
    /// # Errors
    ///
    /// Returns error if the repository fails.
    #[tracing::instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn history(
        &self,
        request: &OrderHistoryRequestDto,
    ) -> Result<OrderHistoryDto, ServiceError> {
        let query = HistoryQuery::new(
            request.limit,
            request.offset,
            request.sort_by,
            request.sort_order,
        );
        let orders = self.orders.find_history(&request.user_id, &query).await?;
        let total = self.orders.count_by_user(&request.user_id).await?;

        let limit = u64::from(query.limit());
        let shown = query.offset() + orders.len() as u64;
        Ok(OrderHistoryDto {
            orders: orders.iter().map(OrderDetailsDto::from_order).collect(),
            total,
            page: query.offset() / limit + 1,
            limit: query.limit(),
            has_more: shown < total,
        })
    }

    async fn find_owned(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order, ServiceError> {
        match self.orders.find_by_id(order_id).await? {
            Some(order) if order.user_id() == user_id => Ok(order),
            _ => Err(ServiceError::not_found(order_id.as_str())),
        }
    }
}
