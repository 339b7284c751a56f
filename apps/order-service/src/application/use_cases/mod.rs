//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod cancel_order;
mod process_order;
mod query_orders;
mod submit_order;

pub use cancel_order::{CANCELLED_MESSAGE, CancelOrderUseCase};
pub use process_order::{ProcessOrderUseCase, ProcessOutcome, ProcessingSettings};
pub use query_orders::QueryOrdersUseCase;
pub use submit_order::{SubmissionSettings, SubmitOrderUseCase};
