// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Order Service - Rust Core Library
//!
//! Order lifecycle pipeline for a retail brokerage: accept orders, validate
//! them against market data, persist them, queue them for asynchronous
//! execution and report their status.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `order_lifecycle`: Order aggregate, status state machine, repository port
//!   - `idempotency`: Request fingerprints, idempotency records and store port
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: Broker, market data, executor and token verifier interfaces
//!   - `use_cases`: `SubmitOrder`, `CancelOrder`, `QueryOrders`, `ProcessOrder`
//!   - `services`: Worker pool consuming the broker
//!   - `dto`: Data transfer objects for API boundaries
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`, `idempotency`, `broker`: in-memory and durable backends
//!   - `marketdata`, `execution`, `auth`: outbound collaborators
//!   - `http`, `grpc`: inbound surfaces
//!   - `config`: Backend selection and dependency injection container
//!
//! Cross-cutting: `config` (YAML loading), `error` (error codes and
//! transport mapping), `observability` (logging and metrics).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Service configuration.
pub mod config;

/// Error codes and transport mapping.
pub mod error;

/// Logging and metrics.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::idempotency::{Fingerprint, IdempotencyKey, IdempotencyStatus};
pub use domain::order_lifecycle::{
    CancelReason, Order, OrderSide, OrderStateMachine, OrderStatus, OrderType,
};
pub use domain::shared::{OrderId, Price, Quantity, Symbol, Timestamp, UserId};

// Application re-exports
pub use application::use_cases::{
    CancelOrderUseCase, ProcessOrderUseCase, QueryOrdersUseCase, SubmitOrderUseCase,
};

// Infrastructure re-exports
pub use infrastructure::config::Container;
pub use infrastructure::http::{AppState, create_router};

pub use error::{ErrorCode, ServiceError};
