//! Backend selection.
//!
//! Each port has a development adapter and a durable one. The enums here
//! pick one at start-up from configuration while keeping the application
//! container statically typed.

use async_trait::async_trait;

use crate::application::ports::{
    BrokerError, BrokerMessage, Delivery, MarketDataError, MarketDataPort, OrderBroker,
    PriceQuote, SymbolInfo, TradingHours,
};
use crate::config::{
    BrokerBackend, BrokerConfig, IdempotencyBackend, IdempotencyConfig, MarketDataBackend,
    MarketDataConfig, PersistenceBackend, PersistenceConfig,
};
use crate::domain::idempotency::{
    BeginOutcome, IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore,
    RecordedFailure,
};
use crate::domain::order_lifecycle::{
    CasOutcome, ExecutionRecord, HistoryQuery, Order, OrderRepository, RepositoryError,
    StatusTransition,
};
use crate::domain::shared::{OrderId, Symbol, UserId};
use crate::infrastructure::broker::{InMemoryOrderBroker, SqliteOrderBroker, sqlite::SqliteBrokerSettings};
use crate::infrastructure::idempotency::{InMemoryIdempotencyStore, RedisIdempotencyStore};
use crate::infrastructure::marketdata::{HttpMarketDataAdapter, HttpMarketDataConfig, StaticMarketData};
use crate::infrastructure::persistence::{InMemoryOrderRepository, SqliteOrderRepository};

// ============================================
// Order repository
// ============================================

/// Configured order repository.
pub enum RepositoryBackend {
    /// Process-local.
    Memory(InMemoryOrderRepository),
    /// SQLite via sqlx.
    Sqlite(SqliteOrderRepository),
}

impl RepositoryBackend {
    /// Open the configured repository.
    pub async fn from_config(config: &PersistenceConfig) -> Result<Self, RepositoryError> {
        match config.backend {
            PersistenceBackend::Memory => Ok(Self::Memory(InMemoryOrderRepository::new())),
            PersistenceBackend::Sqlite => {
                let repo =
                    SqliteOrderRepository::connect(&config.database_url, config.max_connections)
                        .await?;
                Ok(Self::Sqlite(repo))
            }
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            Self::Memory($inner) => $call,
            Self::Sqlite($inner) => $call,
        }
    };
}

#[async_trait]
impl OrderRepository for RepositoryBackend {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        delegate!(self, repo => repo.save(order).await)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        delegate!(self, repo => repo.find_by_id(id).await)
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        delegate!(self, repo => repo.find_by_user_id(user_id).await)
    }

    async fn update_status(
        &self,
        id: &OrderId,
        transition: &StatusTransition,
    ) -> Result<CasOutcome, RepositoryError> {
        delegate!(self, repo => repo.update_status(id, transition).await)
    }

    async fn update_execution(
        &self,
        id: &OrderId,
        execution: &ExecutionRecord,
    ) -> Result<CasOutcome, RepositoryError> {
        delegate!(self, repo => repo.update_execution(id, execution).await)
    }

    async fn find_history(
        &self,
        user_id: &UserId,
        query: &HistoryQuery,
    ) -> Result<Vec<Order>, RepositoryError> {
        delegate!(self, repo => repo.find_history(user_id, query).await)
    }

    async fn count_by_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        delegate!(self, repo => repo.count_by_user(user_id).await)
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        delegate!(self, repo => repo.delete(id).await)
    }
}

// ============================================
// Idempotency store
// ============================================

/// Configured idempotency store.
pub enum IdempotencyStoreBackend {
    /// Process-local.
    Memory(InMemoryIdempotencyStore),
    /// Redis.
    Redis(RedisIdempotencyStore),
}

impl IdempotencyStoreBackend {
    /// Open the configured store.
    pub async fn from_config(config: &IdempotencyConfig) -> Result<Self, IdempotencyError> {
        match config.backend {
            IdempotencyBackend::Memory => Ok(Self::Memory(InMemoryIdempotencyStore::new())),
            IdempotencyBackend::Redis => Ok(Self::Redis(
                RedisIdempotencyStore::connect(&config.redis_url).await?,
            )),
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl IdempotencyStore for IdempotencyStoreBackend {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn try_begin(
        &self,
        key: &IdempotencyKey,
        ttl_secs: u64,
    ) -> Result<BeginOutcome, IdempotencyError> {
        match self {
            Self::Memory(store) => store.try_begin(key, ttl_secs).await,
            Self::Redis(store) => store.try_begin(key, ttl_secs).await,
        }
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        order_id: &OrderId,
    ) -> Result<(), IdempotencyError> {
        match self {
            Self::Memory(store) => store.complete(key, order_id).await,
            Self::Redis(store) => store.complete(key, order_id).await,
        }
    }

    async fn fail(
        &self,
        key: &IdempotencyKey,
        failure: &RecordedFailure,
    ) -> Result<(), IdempotencyError> {
        match self {
            Self::Memory(store) => store.fail(key, failure).await,
            Self::Redis(store) => store.fail(key, failure).await,
        }
    }
}

// ============================================
// Order broker
// ============================================

/// Configured order broker.
pub enum OrderBrokerBackend {
    /// Process-local queues.
    Memory(InMemoryOrderBroker),
    /// SQLite durable queues.
    Sqlite(SqliteOrderBroker),
}

impl OrderBrokerBackend {
    /// Open the configured broker.
    pub async fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        match config.backend {
            BrokerBackend::Memory => Ok(Self::Memory(InMemoryOrderBroker::with_queues(
                config.main_queue.clone(),
                config.dead_letter_queue.clone(),
            ))),
            BrokerBackend::Sqlite => {
                let broker = SqliteOrderBroker::connect(SqliteBrokerSettings {
                    database_url: config.database_url.clone(),
                    main_queue: config.main_queue.clone(),
                    dead_letter_queue: config.dead_letter_queue.clone(),
                    poll_interval: config.poll_interval(),
                    max_connections: 5,
                })
                .await?;
                Ok(Self::Sqlite(broker))
            }
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

#[async_trait]
impl OrderBroker for OrderBrokerBackend {
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        delegate!(self, broker => broker.publish(message).await)
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        delegate!(self, broker => broker.receive().await)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        delegate!(self, broker => broker.ack(delivery).await)
    }

    async fn nack_requeue(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        delegate!(self, broker => broker.nack_requeue(delivery, reason).await)
    }

    async fn nack_dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        delegate!(self, broker => broker.nack_dead_letter(delivery, reason).await)
    }

    async fn health_check(&self) -> Result<(), BrokerError> {
        delegate!(self, broker => broker.health_check().await)
    }

    fn close(&self) {
        delegate!(self, broker => broker.close());
    }
}

// ============================================
// Market data
// ============================================

/// Configured market data provider.
pub enum MarketDataProvider {
    /// Fixed prices from configuration.
    Static(StaticMarketData),
    /// Remote HTTP provider.
    Http(HttpMarketDataAdapter),
}

impl MarketDataProvider {
    /// Build the configured provider. The HTTP client deadline is the
    /// per-call market data timeout.
    pub fn from_config(
        config: &MarketDataConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, MarketDataError> {
        match config.backend {
            MarketDataBackend::Static => Ok(Self::Static(StaticMarketData::from_prices(
                config.prices.iter().map(|(symbol, price)| (symbol.as_str(), *price)),
                config.market_open,
            ))),
            MarketDataBackend::Http => Ok(Self::Http(HttpMarketDataAdapter::new(
                &HttpMarketDataConfig {
                    base_url: config.base_url.clone(),
                    api_key: config.api_key.clone(),
                    timeout,
                },
            )?)),
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Http(_) => "http",
        }
    }
}

#[async_trait]
impl MarketDataPort for MarketDataProvider {
    async fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, MarketDataError> {
        match self {
            Self::Static(md) => md.symbol_info(symbol).await,
            Self::Http(md) => md.symbol_info(symbol).await,
        }
    }

    async fn current_price(&self, symbol: &Symbol) -> Result<PriceQuote, MarketDataError> {
        match self {
            Self::Static(md) => md.current_price(symbol).await,
            Self::Http(md) => md.current_price(symbol).await,
        }
    }

    async fn trading_hours(&self, symbol: &Symbol) -> Result<TradingHours, MarketDataError> {
        match self {
            Self::Static(md) => md.trading_hours(symbol).await,
            Self::Http(md) => md.trading_hours(symbol).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn defaults_select_in_process_backends() {
        let repo = RepositoryBackend::from_config(&PersistenceConfig::default())
            .await
            .unwrap();
        assert_eq!(repo.name(), "memory");
        let store = IdempotencyStoreBackend::from_config(&IdempotencyConfig::default())
            .await
            .unwrap();
        assert_eq!(store.name(), "memory");
        let broker = OrderBrokerBackend::from_config(&BrokerConfig::default())
            .await
            .unwrap();
        assert_eq!(broker.name(), "memory");
        broker.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn static_market_data_uses_configured_prices() {
        let mut config = MarketDataConfig::default();
        config.prices.insert("aapl".to_string(), dec!(150));
        let md = MarketDataProvider::from_config(&config, std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(md.name(), "static");

        let quote = md.current_price(&Symbol::new("AAPL")).await.unwrap();
        assert_eq!(quote.price.amount(), dec!(150));
        assert!(md.trading_hours(&Symbol::new("AAPL")).await.unwrap().is_open);
    }

    #[tokio::test]
    async fn sqlite_repository_backend_round_trips() {
        let config = PersistenceConfig {
            backend: PersistenceBackend::Sqlite,
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        let repo = RepositoryBackend::from_config(&config).await.unwrap();
        assert_eq!(repo.name(), "sqlite");
        assert_eq!(repo.count_by_user(&UserId::new("u1")).await.unwrap(), 0);
    }
}
