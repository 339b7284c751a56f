//! Order Executor Port (Driven Port)
//!
//! Produces an execution for a PROCESSING order. Implementations must not
//! write to the order repository; the worker owns every status change.

use async_trait::async_trait;

use crate::domain::order_lifecycle::Order;
use crate::domain::shared::{Price, Timestamp};
use crate::error::ErrorCode;

/// Result of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Price the order executed at.
    pub execution_price: Price,
    /// When it executed.
    pub executed_at: Timestamp,
}

/// Typed execution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionFailure {
    /// Market data needed for execution did not arrive in time.
    #[error("Market data timeout: {0}")]
    MarketDataTimeout(String),

    /// A store the executor depends on failed transiently.
    #[error("Transient store failure: {0}")]
    TransientStore(String),

    /// The venue did not answer in time.
    #[error("Broker timeout: {0}")]
    BrokerTimeout(String),

    /// Permanent failure.
    #[error("Processing failed: {0}")]
    Failed(String),
}

impl ExecutionFailure {
    /// Error code recorded for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MarketDataTimeout(_) => ErrorCode::MarketDataTimeout,
            Self::TransientStore(_) => ErrorCode::TransientStore,
            Self::BrokerTimeout(_) => ErrorCode::BrokerTimeout,
            Self::Failed(_) => ErrorCode::ProcessingFailed,
        }
    }

    /// Returns true if a redelivery may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// Order executor port.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Execute a PROCESSING order.
    ///
    /// # Errors
    ///
    /// Returns a typed failure; retryable kinds lead to redelivery.
    async fn execute(&self, order: &Order) -> Result<ExecutionReport, ExecutionFailure>;
}
