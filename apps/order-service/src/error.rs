//! Error taxonomy for the order service.
//!
//! Every failure surfaced synchronously to a caller is a [`ServiceError`]
//! carrying a stable [`ErrorCode`]. The same code drives the HTTP status,
//! the gRPC status and the reason string stored in idempotency records and
//! dead letters.
//!
//! # Status mapping
//!
//! | Code | HTTP | gRPC |
//! |------|------|------|
//! | `VALIDATION`, `INVALID_SYMBOL`, `PRICE_OUT_OF_RANGE`, `MARKET_CLOSED` | 400 | `INVALID_ARGUMENT` |
//! | `CANNOT_CANCEL` | 400 | `FAILED_PRECONDITION` |
//! | `UNAUTHENTICATED` | 401 | `UNAUTHENTICATED` |
//! | `FORBIDDEN` | 403 | `PERMISSION_DENIED` |
//! | `NOT_FOUND` | 404 | `NOT_FOUND` |
//! | `IN_PROGRESS` | 409 | `ABORTED` |
//! | `PRIOR_FAILURE` | 409 | `FAILED_PRECONDITION` |
//! | everything else | 500 | `INTERNAL` |

use std::collections::HashMap;
use std::str::FromStr;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tonic::Code;
use tonic_types::{ErrorDetails, StatusExt};

use crate::application::ports::{AuthError, BrokerError, MarketDataError};
use crate::domain::idempotency::IdempotencyError;
use crate::domain::order_lifecycle::{OrderError, RepositoryError};
use crate::domain::shared::DomainError;

/// Domain for order service errors.
pub const ERROR_DOMAIN: &str = "order-service.orders";

/// Error codes for the order service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input
    /// Malformed or inconsistent request.
    Validation,
    /// Unknown or untradable symbol.
    InvalidSymbol,
    /// Limit price outside the accepted band.
    PriceOutOfRange,

    // Auth
    /// Missing or invalid credentials.
    Unauthenticated,
    /// Authenticated but not allowed.
    Forbidden,

    // Concurrency / state
    /// Same submission already in flight.
    InProgress,
    /// Order is not cancellable.
    CannotCancel,
    /// Status change outside the lifecycle table.
    IllegalTransition,
    /// Order does not exist or is not owned by the caller.
    NotFound,
    /// Same submission previously failed.
    PriorFailure,

    // Upstream
    /// Market data provider failed.
    MarketDataUnavailable,
    /// Market is closed.
    MarketClosed,
    /// Broker did not confirm a publish.
    BrokerUnavailable,
    /// Order store failed.
    StoreUnavailable,
    /// Idempotency store refused the PENDING write.
    IdempotencyWrite,

    // Retryable in worker
    /// Market data timed out during processing.
    MarketDataTimeout,
    /// Order store failed transiently during processing.
    TransientStore,
    /// Venue timed out during processing.
    BrokerTimeout,
    /// Processing exceeded its deadline.
    ProcessingTimeout,

    // Terminal processing
    /// Processing failed permanently.
    ProcessingFailed,
    /// Message could not be handled at all.
    PoisonMessage,
    /// Message referenced an order that does not exist.
    OrderNotFound,

    /// Unexpected server error.
    Internal,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [Self; 23] = [
        Self::Validation,
        Self::InvalidSymbol,
        Self::PriceOutOfRange,
        Self::Unauthenticated,
        Self::Forbidden,
        Self::InProgress,
        Self::CannotCancel,
        Self::IllegalTransition,
        Self::NotFound,
        Self::PriorFailure,
        Self::MarketDataUnavailable,
        Self::MarketClosed,
        Self::BrokerUnavailable,
        Self::StoreUnavailable,
        Self::IdempotencyWrite,
        Self::MarketDataTimeout,
        Self::TransientStore,
        Self::BrokerTimeout,
        Self::ProcessingTimeout,
        Self::ProcessingFailed,
        Self::PoisonMessage,
        Self::OrderNotFound,
        Self::Internal,
    ];

    /// Get the gRPC status code for this error.
    #[must_use]
    pub const fn grpc_code(&self) -> Code {
        match self {
            Self::Validation | Self::InvalidSymbol | Self::PriceOutOfRange | Self::MarketClosed => {
                Code::InvalidArgument
            }
            Self::NotFound => Code::NotFound,
            Self::CannotCancel | Self::PriorFailure => Code::FailedPrecondition,
            Self::InProgress => Code::Aborted,
            Self::Unauthenticated => Code::Unauthenticated,
            Self::Forbidden => Code::PermissionDenied,
            _ => Code::Internal,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation
            | Self::InvalidSymbol
            | Self::PriceOutOfRange
            | Self::MarketClosed
            | Self::CannotCancel => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InProgress | Self::PriorFailure => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if a worker should redeliver after this failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MarketDataTimeout
                | Self::TransientStore
                | Self::BrokerTimeout
                | Self::ProcessingTimeout
        )
    }

    /// Get the error reason string (for gRPC `ErrorInfo` and stored records).
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::InvalidSymbol => "INVALID_SYMBOL",
            Self::PriceOutOfRange => "PRICE_OUT_OF_RANGE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::InProgress => "IN_PROGRESS",
            Self::CannotCancel => "CANNOT_CANCEL",
            Self::IllegalTransition => "ILLEGAL_TRANSITION",
            Self::NotFound => "NOT_FOUND",
            Self::PriorFailure => "PRIOR_FAILURE",
            Self::MarketDataUnavailable => "MARKET_DATA_UNAVAILABLE",
            Self::MarketClosed => "MARKET_CLOSED",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::IdempotencyWrite => "IDEMPOTENCY_WRITE",
            Self::MarketDataTimeout => "MARKET_DATA_TIMEOUT",
            Self::TransientStore => "TRANSIENT_STORE",
            Self::BrokerTimeout => "BROKER_TIMEOUT",
            Self::ProcessingTimeout => "PROCESSING_TIMEOUT",
            Self::ProcessingFailed => "PROCESSING_FAILED",
            Self::PoisonMessage => "POISON_MESSAGE",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl FromStr for ErrorCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.reason() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "ErrorCode",
                value: s.to_string(),
            })
    }
}

/// A rich error surfaced by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {message}", .code.reason())]
pub struct ServiceError {
    /// Error code.
    code: ErrorCode,
    /// Human-readable message.
    message: String,
    /// Additional context (key-value pairs).
    context: Vec<(String, String)>,
}

impl ServiceError {
    /// Create a new service error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Look up a context value.
    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Convert to a tonic Status with rich error details.
    #[must_use]
    pub fn to_status(&self) -> tonic::Status {
        let mut details = ErrorDetails::new();

        let metadata: HashMap<String, String> = self.context.iter().cloned().collect();
        details.set_error_info(self.code.reason(), ERROR_DOMAIN, metadata);

        match self.code {
            ErrorCode::Validation | ErrorCode::InvalidSymbol | ErrorCode::PriceOutOfRange => {
                let field = self.context_value("field").unwrap_or("request").to_string();
                details.add_bad_request_violation(field, &self.message);
            }
            ErrorCode::CannotCancel | ErrorCode::PriorFailure => {
                details.add_precondition_failure_violation(
                    "order",
                    self.code.reason(),
                    &self.message,
                );
            }
            _ => {}
        }

        tonic::Status::with_error_details(self.code.grpc_code(), &self.message, details)
    }

    /// Convert to an HTTP error body.
    #[must_use]
    pub fn to_http_body(&self) -> HttpErrorResponse {
        HttpErrorResponse {
            error: HttpErrorBody {
                code: self.code.reason().to_string(),
                message: self.message.clone(),
                details: self.context.iter().cloned().collect(),
            },
        }
    }
}

/// HTTP error response: `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// The error.
    pub error: HttpErrorBody,
}

/// HTTP error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorBody {
    /// Error code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

/// Convenience constructors for common errors.
impl ServiceError {
    /// Invalid request.
    #[must_use]
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message).with_context("field", field)
    }

    /// Order not found (or not owned).
    #[must_use]
    pub fn not_found(order_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Order {order_id} not found"))
            .with_context("order_id", order_id)
    }

    /// Order cannot be cancelled.
    #[must_use]
    pub fn cannot_cancel(order_id: &str, status: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::CannotCancel,
            format!("Order {order_id} cannot be cancelled in status {status}"),
        )
        .with_context("order_id", order_id)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match &err {
            OrderError::InvalidParameters { field, .. } => {
                Self::new(ErrorCode::Validation, err.to_string()).with_context("field", field)
            }
            OrderError::PriceOutOfRange { market_price, .. } => {
                Self::new(ErrorCode::PriceOutOfRange, err.to_string())
                    .with_context("field", "price")
                    .with_context("market_price", market_price)
            }
            OrderError::IllegalTransition { .. } | OrderError::StatusMismatch { .. } => {
                Self::new(ErrorCode::IllegalTransition, err.to_string())
            }
            OrderError::InvariantViolation { .. } => {
                Self::new(ErrorCode::Validation, err.to_string())
            }
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        let field = match &err {
            DomainError::InvalidValue { field, .. } => field.clone(),
            DomainError::UnknownVariant { kind, .. } => (*kind).to_string(),
        };
        Self::new(ErrorCode::Validation, err.to_string()).with_context("field", field)
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        Self::new(ErrorCode::StoreUnavailable, err.to_string())
    }
}

impl From<IdempotencyError> for ServiceError {
    fn from(err: IdempotencyError) -> Self {
        Self::new(ErrorCode::IdempotencyWrite, err.to_string())
    }
}

impl From<BrokerError> for ServiceError {
    fn from(err: BrokerError) -> Self {
        Self::new(ErrorCode::BrokerUnavailable, err.to_string())
    }
}

impl From<MarketDataError> for ServiceError {
    fn from(err: MarketDataError) -> Self {
        match &err {
            MarketDataError::SymbolNotFound { symbol } => {
                Self::new(ErrorCode::InvalidSymbol, err.to_string())
                    .with_context("field", "symbol")
                    .with_context("symbol", symbol)
            }
            _ => Self::new(ErrorCode::MarketDataUnavailable, err.to_string()),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden(_) => Self::new(ErrorCode::Forbidden, err.to_string()),
            AuthError::MissingToken | AuthError::InvalidToken => {
                Self::new(ErrorCode::Unauthenticated, err.to_string())
            }
        }
    }
}
