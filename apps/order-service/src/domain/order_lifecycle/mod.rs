//! Order Lifecycle Bounded Context
//!
//! Governs an order from acceptance through execution or cancellation.
//!
//! # Key Concepts
//!
//! - **Order Aggregate**: owns the invariants on price, quantity and execution fields
//! - **State Machine**: the only place a legal status change can be minted
//! - **Repository**: compare-and-set persistence of status changes

pub mod aggregate;
pub mod errors;
pub mod repository;
pub mod services;
pub mod value_objects;

pub use aggregate::{CreateOrderCommand, Order, ReconstitutedOrderParams};
pub use errors::OrderError;
pub use repository::{
    CasOutcome, HistoryQuery, MAX_HISTORY_LIMIT, OrderRepository, RepositoryError, SortField,
    SortOrder,
};
pub use services::{ExecutionRecord, OrderStateMachine, PriceSanityPolicy, StatusTransition};
pub use value_objects::{CancelReason, OrderSide, OrderStatus, OrderType};
