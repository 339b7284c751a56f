//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Services**: Stateless business logic
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`order_lifecycle`]: Order aggregate, state machine and repository port
//! - [`idempotency`]: Submission fingerprints and the idempotency store port

pub mod idempotency;
pub mod order_lifecycle;
pub mod shared;
