//! Authentication Adapters

mod static_token;

pub use static_token::StaticTokenVerifier;
