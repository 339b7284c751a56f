//! Order lifecycle value objects.

mod cancel_reason;
mod order_side;
mod order_status;
mod order_type;

pub use cancel_reason::CancelReason;
pub use order_side::OrderSide;
pub use order_status::OrderStatus;
pub use order_type::OrderType;
