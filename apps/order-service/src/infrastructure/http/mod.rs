//! HTTP/REST API adapter.
//!
//! Inbound adapter implementing REST endpoints that delegate to application use cases.

mod auth;
mod controller;
mod request;
mod response;

pub use auth::AuthenticatedUser;
pub use controller::{AppState, create_router};
pub use request::*;
pub use response::*;
