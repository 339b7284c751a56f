//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to application use cases.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::application::ports::{MarketDataPort, OrderBroker, TokenVerifier};
use crate::application::use_cases::{CancelOrderUseCase, QueryOrdersUseCase, SubmitOrderUseCase};
use crate::domain::idempotency::IdempotencyStore;
use crate::domain::order_lifecycle::OrderRepository;
use crate::domain::shared::OrderId;
use crate::error::ServiceError;

use super::auth::AuthenticatedUser;
use super::request::{CancelOrderRequest, HistoryParams, SubmitOrderRequest};
use super::response::{ApiError, HealthResponse};

/// Application state shared across handlers.
pub struct AppState<R, I, M, B>
where
    R: OrderRepository,
    I: IdempotencyStore,
    M: MarketDataPort,
    B: OrderBroker,
{
    /// Use case for submitting orders.
    pub submit_order: Arc<SubmitOrderUseCase<R, I, M, B>>,
    /// Use case for cancelling orders.
    pub cancel_order: Arc<CancelOrderUseCase<R>>,
    /// Read side.
    pub query_orders: Arc<QueryOrdersUseCase<R>>,
    /// Broker, for health reporting.
    pub broker: Arc<B>,
    /// Bearer token verifier.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Application version.
    pub version: String,
}

impl<R, I, M, B> Clone for AppState<R, I, M, B>
where
    R: OrderRepository,
    I: IdempotencyStore,
    M: MarketDataPort,
    B: OrderBroker,
{
    fn clone(&self) -> Self {
        Self {
            submit_order: Arc::clone(&self.submit_order),
            cancel_order: Arc::clone(&self.cancel_order),
            query_orders: Arc::clone(&self.query_orders),
            broker: Arc::clone(&self.broker),
            verifier: Arc::clone(&self.verifier),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<R, I, M, B>(state: AppState<R, I, M, B>) -> Router
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/orders", post(submit_order))
        .route("/orders/history", get(order_history))
        .route("/orders/{id}", get(order_details))
        .route("/orders/{id}/status", get(order_status))
        .route("/orders/{id}/cancel", put(cancel_order))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<R, I, M, B>(State(state): State<AppState<R, I, M, B>>) -> impl IntoResponse
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let (status, code, broker) = match state.broker.health_check().await {
        Ok(()) => ("healthy", StatusCode::OK, "ok".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Broker health check failed");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: state.version.clone(),
            broker,
        }),
    )
}

/// Submit an order: 202 when accepted, 200 for an idempotent replay.
async fn submit_order<R, I, M, B>(
    State(state): State<AppState<R, I, M, B>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<SubmitOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let Json(request) = payload.map_err(|e| ServiceError::validation("body", e.body_text()))?;
    let result = state.submit_order.execute(request.into_dto(user_id)).await?;
    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(result)))
}

async fn order_details<R, I, M, B>(
    State(state): State<AppState<R, I, M, B>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let details = state.query_orders.details(&OrderId::new(id), &user_id).await?;
    Ok(Json(details))
}

async fn order_status<R, I, M, B>(
    State(state): State<AppState<R, I, M, B>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let status = state.query_orders.status(&OrderId::new(id), &user_id).await?;
    Ok(Json(status))
}

async fn order_history<R, I, M, B>(
    State(state): State<AppState<R, I, M, B>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let Query(params) = params.map_err(|e| ServiceError::validation("query", e.body_text()))?;
    let request = params.into_dto(user_id)?;
    let history = state.query_orders.history(&request).await?;
    Ok(Json(history))
}

/// Cancel an order. The body is optional.
async fn cancel_order<R, I, M, B>(
    State(state): State<AppState<R, I, M, B>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    R: OrderRepository + 'static,
    I: IdempotencyStore + 'static,
    M: MarketDataPort + 'static,
    B: OrderBroker + 'static,
{
    let request: CancelOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServiceError::validation("body", e.to_string()))?
    };
    let result = state
        .cancel_order
        .execute(&OrderId::new(id), &user_id, request.reason())
        .await?;
    Ok(Json(result))
}
