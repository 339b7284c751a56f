//! gRPC Adapter (Driver Adapter)
//!
//! Authentication interceptor and status mapping shared by tonic services.

mod interceptor;
mod status;

pub use interceptor::{AuthInterceptor, USER_ID_METADATA, authenticated_user, is_trusted_peer};
pub use status::http_status_for;
