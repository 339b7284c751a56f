//! Token verifier backed by a configured token table.

use std::collections::HashMap;

use crate::application::ports::{AuthContext, AuthError, TokenVerifier};
use crate::domain::shared::UserId;

/// Maps opaque bearer tokens to user IDs.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    /// Build from a token -> user ID table.
    #[must_use]
    pub fn new<I, T, U>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(token, user)| (token.into(), UserId::new(user)))
                .collect(),
        }
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.tokens
            .get(token)
            .filter(|user| !user.is_blank())
            .map(|user_id| AuthContext {
                user_id: user_id.clone(),
            })
            .ok_or(AuthError::InvalidToken)
    }
}
