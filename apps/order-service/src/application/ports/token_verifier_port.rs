//! Token Verifier Port (Driven Port)
//!
//! Maps a bearer token to the authenticated user. Token issuance lives
//! outside this service.

use crate::domain::shared::UserId;

/// Authenticated caller, injected into request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// User the token belongs to.
    pub user_id: UserId,
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("Missing bearer token")]
    MissingToken,

    /// Credentials were malformed or unknown.
    #[error("Invalid bearer token")]
    InvalidToken,

    /// Credentials are valid but not allowed here.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Token verifier port.
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw bearer token (without the `Bearer ` prefix).
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for unknown tokens.
    fn verify(&self, token: &str) -> Result<AuthContext, AuthError>;
}

/// Extract the token from an `authorization` header value.
///
/// # Errors
///
/// Returns `MissingToken` for an empty value and `InvalidToken` for a
/// non-bearer scheme.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(AuthError::MissingToken);
    }
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::InvalidToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidToken);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
