//! Dependency Injection Container
//!
//! Builds every adapter from [`Config`] and wires the use cases on top.

use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use crate::application::ports::{BrokerError, MarketDataError, TokenVerifier};
use crate::application::services::{WorkerPool, WorkerPoolHandle};
use crate::application::use_cases::{
    CancelOrderUseCase, ProcessOrderUseCase, ProcessingSettings, QueryOrdersUseCase,
    SubmissionSettings, SubmitOrderUseCase,
};
use crate::config::Config;
use crate::domain::idempotency::IdempotencyError;
use crate::domain::order_lifecycle::RepositoryError;
use crate::infrastructure::auth::StaticTokenVerifier;
use crate::infrastructure::execution::SimulatedExecutor;
use crate::infrastructure::grpc::AuthInterceptor;
use crate::infrastructure::http::{AppState, create_router};

use super::backends::{
    IdempotencyStoreBackend, MarketDataProvider, OrderBrokerBackend, RepositoryBackend,
};

/// Submission use case over the configured backends.
pub type ConfiguredSubmitOrder = SubmitOrderUseCase<
    RepositoryBackend,
    IdempotencyStoreBackend,
    MarketDataProvider,
    OrderBrokerBackend,
>;

/// Processing use case over the configured backends.
pub type ConfiguredProcessOrder =
    ProcessOrderUseCase<RepositoryBackend, OrderBrokerBackend, SimulatedExecutor>;

/// HTTP state over the configured backends.
pub type ConfiguredAppState =
    AppState<RepositoryBackend, IdempotencyStoreBackend, MarketDataProvider, OrderBrokerBackend>;

/// Failure while building the container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Order repository could not be opened.
    #[error("order repository: {0}")]
    Repository(#[from] RepositoryError),
    /// Idempotency store could not be opened.
    #[error("idempotency store: {0}")]
    Idempotency(#[from] IdempotencyError),
    /// Broker could not be opened.
    #[error("order broker: {0}")]
    Broker(#[from] BrokerError),
    /// Market data provider could not be built.
    #[error("market data: {0}")]
    MarketData(#[from] MarketDataError),
}

/// Dependency injection container.
///
/// Holds the shared adapters. Use case factories hand out fresh use cases
/// over the same `Arc`s, so HTTP handlers and workers see one store.
pub struct Container {
    config: Config,
    orders: Arc<RepositoryBackend>,
    idempotency: Arc<IdempotencyStoreBackend>,
    market_data: Arc<MarketDataProvider>,
    broker: Arc<OrderBrokerBackend>,
    executor: Arc<SimulatedExecutor>,
    verifier: Arc<StaticTokenVerifier>,
}

impl Container {
    /// Open every configured backend.
    ///
    /// # Errors
    ///
    /// Returns the first adapter that fails to open.
    pub async fn from_config(config: Config) -> Result<Self, ContainerError> {
        let orders = RepositoryBackend::from_config(&config.persistence).await?;
        let idempotency = IdempotencyStoreBackend::from_config(&config.idempotency).await?;
        let broker = OrderBrokerBackend::from_config(&config.broker).await?;
        let market_data = MarketDataProvider::from_config(
            &config.market_data,
            config.submission.market_data_timeout(),
        )?;
        let verifier = StaticTokenVerifier::new(
            config
                .auth
                .tokens
                .iter()
                .map(|(token, user)| (token.clone(), user.clone())),
        );

        tracing::info!(
            orders = orders.name(),
            idempotency = idempotency.name(),
            broker = broker.name(),
            market_data = market_data.name(),
            "Backends initialized"
        );

        Ok(Self {
            config,
            orders: Arc::new(orders),
            idempotency: Arc::new(idempotency),
            market_data: Arc::new(market_data),
            broker: Arc::new(broker),
            executor: Arc::new(SimulatedExecutor::new()),
            verifier: Arc::new(verifier),
        })
    }

    /// Loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared order repository.
    #[must_use]
    pub fn orders(&self) -> Arc<RepositoryBackend> {
        Arc::clone(&self.orders)
    }

    /// Shared broker.
    #[must_use]
    pub fn broker(&self) -> Arc<OrderBrokerBackend> {
        Arc::clone(&self.broker)
    }

    /// Shared market data provider.
    #[must_use]
    pub fn market_data(&self) -> Arc<MarketDataProvider> {
        Arc::clone(&self.market_data)
    }

    // ========================================================================
    // Use case factories
    // ========================================================================

    /// Create the submission use case.
    #[must_use]
    pub fn submit_order_use_case(&self) -> ConfiguredSubmitOrder {
        let submission = &self.config.submission;
        SubmitOrderUseCase::new(
            self.orders(),
            Arc::clone(&self.idempotency),
            self.market_data(),
            self.broker(),
            SubmissionSettings {
                idempotency_ttl_secs: submission.idempotency_ttl_secs,
                market_data_timeout: submission.market_data_timeout(),
                price_policy: submission.price_policy(),
            },
        )
    }

    /// Create the cancellation use case.
    #[must_use]
    pub fn cancel_order_use_case(&self) -> CancelOrderUseCase<RepositoryBackend> {
        CancelOrderUseCase::new(self.orders())
    }

    /// Create the read-side use case.
    #[must_use]
    pub fn query_orders_use_case(&self) -> QueryOrdersUseCase<RepositoryBackend> {
        QueryOrdersUseCase::new(self.orders())
    }

    /// Create the worker-side processing use case.
    #[must_use]
    pub fn process_order_use_case(&self) -> ConfiguredProcessOrder {
        ProcessOrderUseCase::new(
            self.orders(),
            self.broker(),
            Arc::clone(&self.executor),
            ProcessingSettings {
                max_redeliveries: self.config.worker.max_redeliveries,
                processing_timeout: self.config.worker.processing_timeout(),
            },
        )
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    /// Shared HTTP handler state.
    #[must_use]
    pub fn app_state(&self) -> ConfiguredAppState {
        AppState {
            submit_order: Arc::new(self.submit_order_use_case()),
            cancel_order: Arc::new(self.cancel_order_use_case()),
            query_orders: Arc::new(self.query_orders_use_case()),
            broker: self.broker(),
            verifier: self.verifier(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// HTTP router over the configured backends.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.app_state())
    }

    /// gRPC authentication interceptor.
    #[must_use]
    pub fn auth_interceptor(&self) -> AuthInterceptor {
        AuthInterceptor::new(self.verifier(), self.config.auth.trust_loopback)
    }

    /// Start the configured number of broker consumers.
    #[must_use]
    pub fn start_workers(&self) -> WorkerPoolHandle {
        WorkerPool::start(
            Arc::new(self.process_order_use_case()),
            self.config.worker.concurrency,
        )
    }

    fn verifier(&self) -> Arc<dyn TokenVerifier> {
        Arc::clone(&self.verifier) as Arc<dyn TokenVerifier>
    }
}
