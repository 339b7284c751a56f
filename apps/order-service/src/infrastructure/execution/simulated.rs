//! Simulated executor.
//!
//! Fills at the order's limit/stop price when it has one, else at the
//! market price observed at submission. Never touches the repository.

use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{ExecutionFailure, ExecutionReport, OrderExecutor};
use crate::domain::order_lifecycle::Order;
use crate::domain::shared::Timestamp;

/// Executor that fills immediately, optionally after a fixed latency.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    latency: Duration,
}

impl SimulatedExecutor {
    /// Create an executor with no latency.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Create an executor that waits `latency` before each fill.
    #[must_use]
    pub const fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl OrderExecutor for SimulatedExecutor {
    async fn execute(&self, order: &Order) -> Result<ExecutionReport, ExecutionFailure> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let execution_price = order
            .price()
            .or_else(|| order.market_price_at_submission())
            .ok_or_else(|| {
                ExecutionFailure::Failed(format!(
                    "No execution price available for order {}",
                    order.order_id()
                ))
            })?;

        Ok(ExecutionReport {
            execution_price,
            executed_at: Timestamp::now(),
        })
    }
}
