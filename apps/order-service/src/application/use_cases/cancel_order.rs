//! Cancel Order Use Case

use std::sync::Arc;

use crate::application::dto::CancelOrderResultDto;
use crate::domain::order_lifecycle::{
    CancelReason, CasOutcome, Order, OrderRepository, OrderStateMachine, OrderStatus,
};
use crate::domain::shared::{OrderId, UserId};
use crate::error::ServiceError;
use crate::observability;

/// Message returned with a successful cancellation.
pub const CANCELLED_MESSAGE: &str = "Order cancelled";

/// Use case for cancelling a user's order.
///
/// PENDING orders are cancelled outright. PROCESSING orders are cancelled
/// cooperatively: the worker sees CANCELLED before its final write and
/// discards the execution.
pub struct CancelOrderUseCase<R>
where
    R: OrderRepository,
{
    orders: Arc<R>,
}

impl<R> CancelOrderUseCase<R>
where
    R: OrderRepository,
{
    /// Create a new `CancelOrderUseCase`.
    pub const fn new(orders: Arc<R>) -> Self {
        Self { orders }
    }

    /// Cancel an order owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown or foreign orders and `CANNOT_CANCEL`
    /// when the order is terminal or reaches a terminal status first.
    #[tracing::instrument(skip_all, fields(order_id = %order_id, user_id = %user_id))]
    pub async fn execute(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        reason: CancelReason,
    ) -> Result<CancelOrderResultDto, ServiceError> {
        let result = self.cancel(order_id, user_id, reason).await;
        match &result {
            Ok(_) => observability::record_order_cancelled("cancelled"),
            Err(e) => observability::record_order_cancelled(e.code().reason()),
        }
        result
    }

    async fn cancel(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        reason: CancelReason,
    ) -> Result<CancelOrderResultDto, ServiceError> {
        let mut order = self.load_owned(order_id, user_id).await?;
        let mut retried = false;

        loop {
            let from = order.status();
            if !from.can_cancel() {
                return Err(ServiceError::cannot_cancel(order_id.as_str(), from));
            }

            let transition = OrderStateMachine::transition(from, OrderStatus::Cancelled)?
                .with_cancel_reason(reason.clone());

            match self.orders.update_status(order_id, &transition).await? {
                CasOutcome::Applied(cancelled) => {
                    tracing::info!(from = %from, reason = %reason, "Order cancelled");
                    return Ok(CancelOrderResultDto {
                        order_id: cancelled.order_id().clone(),
                        status: cancelled.status(),
                        reason,
                        message: CANCELLED_MESSAGE.to_string(),
                        cancelled_at: transition.at(),
                    });
                }
                CasOutcome::Conflict { actual: None } => {
                    return Err(ServiceError::not_found(order_id.as_str()));
                }
                // A worker may have just claimed it; try again once against
                // the status we now see.
                CasOutcome::Conflict { actual: Some(actual) }
                    if from == OrderStatus::Pending && !retried =>
                {
                    tracing::debug!(actual = %actual, "Cancel lost a race, re-reading order");
                    retried = true;
                    order = self.load_owned(order_id, user_id).await?;
                }
                CasOutcome::Conflict { actual: Some(actual) } => {
                    return Err(ServiceError::cannot_cancel(order_id.as_str(), actual));
                }
            }
        }
    }

    async fn load_owned(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order, ServiceError> {
        match self.orders.find_by_id(order_id).await? {
            Some(order) if order.user_id() == user_id => Ok(order),
            _ => Err(ServiceError::not_found(order_id.as_str())),
        }
    }
}
