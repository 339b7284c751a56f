//! Bearer-token interceptor for tonic services.
//!
//! Resolves `authorization: Bearer <token>` metadata to an [`AuthContext`]
//! and stores it in the request extensions for handlers to read back with
//! [`authenticated_user`].

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::application::ports::{AuthContext, AuthError, TokenVerifier, parse_bearer};
use crate::domain::shared::UserId;
use crate::error::ServiceError;

/// Metadata key a trusted loopback peer may use to name the user.
pub const USER_ID_METADATA: &str = "x-user-id";

/// Authenticates every call before it reaches a service.
#[derive(Clone)]
pub struct AuthInterceptor {
    verifier: Arc<dyn TokenVerifier>,
    trust_loopback: bool,
}

impl AuthInterceptor {
    /// Create an interceptor.
    ///
    /// With `trust_loopback`, calls from 127.0.0.1 / ::1 carrying
    /// `x-user-id` metadata skip token verification.
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, trust_loopback: bool) -> Self {
        Self {
            verifier,
            trust_loopback,
        }
    }

    fn authenticate<T>(&self, request: &Request<T>) -> Result<AuthContext, ServiceError> {
        if is_trusted_peer(request.remote_addr(), self.trust_loopback) {
            let user_id = metadata_str(request, USER_ID_METADATA).map(|user| UserId::new(user.trim()));
            if let Some(user_id) = user_id.filter(|u| !u.is_blank()) {
                return Ok(AuthContext { user_id });
            }
        }

        let header = metadata_str(request, "authorization").ok_or(AuthError::MissingToken)?;
        let token = parse_bearer(header)?;
        Ok(self.verifier.verify(token)?)
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        match self.authenticate(&request) {
            Ok(context) => {
                request.extensions_mut().insert(context);
                Ok(request)
            }
            Err(e) => {
                tracing::debug!(error = %e, "gRPC call rejected");
                Err(e.to_status())
            }
        }
    }
}

/// The user the interceptor attached to a request.
///
/// # Errors
///
/// Returns `Unauthenticated` if the request never passed the interceptor.
pub fn authenticated_user<T>(request: &Request<T>) -> Result<UserId, Status> {
    request
        .extensions()
        .get::<AuthContext>()
        .map(|context| context.user_id.clone())
        .ok_or_else(|| ServiceError::from(AuthError::MissingToken).to_status())
}

/// Whether a peer sits inside the loopback trust boundary.
#[must_use]
pub fn is_trusted_peer(peer: Option<SocketAddr>, trust_loopback: bool) -> bool {
    trust_loopback && peer.is_some_and(|addr| addr.ip().is_loopback())
}

fn metadata_str<'a, T>(request: &'a Request<T>, key: &str) -> Option<&'a str> {
    request.metadata().get(key).and_then(|value| value.to_str().ok())
}
