//! Bearer-token extractor.

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::application::ports::{
    AuthError, MarketDataPort, OrderBroker, parse_bearer,
};
use crate::domain::idempotency::IdempotencyStore;
use crate::domain::order_lifecycle::OrderRepository;
use crate::domain::shared::UserId;
use crate::error::ServiceError;

use super::controller::AppState;
use super::response::ApiError;

/// The user a request's bearer token maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl<R, I, M, B> FromRequestParts<AppState<R, I, M, B>> for AuthenticatedUser
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<R, I, M, B>,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => value.to_str().map_err(|_| AuthError::InvalidToken),
            None => Err(AuthError::MissingToken),
        };
        let context = header
            .and_then(parse_bearer)
            .and_then(|token| state.verifier.verify(token))
            .map_err(ServiceError::from)?;
        Ok(Self(context.user_id))
    }
}
