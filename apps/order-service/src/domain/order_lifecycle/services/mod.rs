//! Order lifecycle domain services.

mod order_state_machine;
mod price_sanity;

pub use order_state_machine::{ExecutionRecord, OrderStateMachine, StatusTransition};
pub use price_sanity::PriceSanityPolicy;
