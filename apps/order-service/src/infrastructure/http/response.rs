//! HTTP response bodies and error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Broker reachability.
    pub broker: String,
}

/// A [`ServiceError`] rendered as `{"error": {code, message}}`.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.code().http_status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = %self.0.code(), message = self.0.message(), "Request failed");
        }
        (status, Json(self.0.to_http_body())).into_response()
    }
}
