//! Submit Order Use Case
//!
//! Accepts a submission, deduplicates it by fingerprint, checks it against
//! market data, persists it PENDING and queues it for the worker pool.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::dto::{ACCEPTED_MESSAGE, REPLAY_MESSAGE, SubmitOrderDto, SubmitOrderResultDto};
use crate::application::ports::{BrokerMessage, MarketDataError, MarketDataPort, OrderBroker};
use crate::domain::idempotency::{
    BeginOutcome, Fingerprint, IdempotencyKey, IdempotencyRecord, IdempotencyStatus,
    IdempotencyStore, MAX_TTL_SECS, RecordedFailure,
};
use crate::domain::order_lifecycle::{
    CreateOrderCommand, Order, OrderRepository, OrderSide, OrderStateMachine, OrderStatus,
    OrderType, PriceSanityPolicy,
};
use crate::domain::shared::{Price, Quantity, Symbol, Timestamp};
use crate::error::{ErrorCode, ServiceError};
use crate::observability;

/// Submission outcome label for a newly accepted order.
const ACCEPTED_OUTCOME: &str = "accepted";
/// Submission outcome label for an idempotent replay.
const REPLAYED_OUTCOME: &str = "replayed";

/// Tunables for the acceptance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionSettings {
    /// Idempotency record lifetime.
    pub idempotency_ttl_secs: u64,
    /// Deadline for each market data call.
    pub market_data_timeout: Duration,
    /// Limit price band.
    pub price_policy: PriceSanityPolicy,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: MAX_TTL_SECS,
            market_data_timeout: Duration::from_secs(5),
            price_policy: PriceSanityPolicy::default(),
        }
    }
}

/// Use case for submitting orders.
pub struct SubmitOrderUseCase<R, I, M, B>
where
    R: OrderRepository,
    I: IdempotencyStore,
    M: MarketDataPort,
    B: OrderBroker,
{
    orders: Arc<R>,
    idempotency: Arc<I>,
    market_data: Arc<M>,
    broker: Arc<B>,
    settings: SubmissionSettings,
}

impl<R, I, M, B> SubmitOrderUseCase<R, I, M, B>
where
    R: OrderRepository,
    I: IdempotencyStore,
    M: MarketDataPort,
    B: OrderBroker,
{
    /// Create a new SubmitOrderUseCase.
    pub const fn new(
        orders: Arc<R>,
        idempotency: Arc<I>,
        market_data: Arc<M>,
        broker: Arc<B>,
        settings: SubmissionSettings,
    ) -> Self {
        Self {
            orders,
            idempotency,
            market_data,
            broker,
            settings,
        }
    }

    /// Execute the use case.
    ///
    /// # Errors
    ///
    /// Returns the first failed acceptance check. Every failure after the
    /// idempotency record was claimed also marks that record FAILED.
    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id, symbol = %dto.symbol))]
    pub async fn execute(&self, dto: SubmitOrderDto) -> Result<SubmitOrderResultDto, ServiceError> {
        // 1. Shape validation
        let cmd = match parse_command(&dto) {
            Ok(cmd) => cmd,
            Err(e) => {
                observability::record_order_submitted(e.code().reason());
                return Err(e);
            }
        };

        // 2. Idempotency guard
        let key = IdempotencyKey::new(
            cmd.user_id.clone(),
            Fingerprint::compute(
                &cmd.user_id,
                &cmd.symbol,
                cmd.order_type,
                cmd.side,
                cmd.quantity,
                cmd.price,
            ),
        );
        match self
            .idempotency
            .try_begin(&key, self.settings.idempotency_ttl_secs)
            .await
        {
            Ok(BeginOutcome::Started(_)) => {}
            Ok(BeginOutcome::Existing(record)) => return replay(&record),
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim idempotency key");
                observability::record_order_submitted(ErrorCode::IdempotencyWrite.reason());
                return Err(e.into());
            }
        }

        match self.accept(cmd, &key).await {
            Ok(result) => {
                observability::record_order_submitted(ACCEPTED_OUTCOME);
                Ok(result)
            }
            Err(e) => {
                let failure = RecordedFailure {
                    code: e.code().reason().to_string(),
                    message: e.message().to_string(),
                };
                if let Err(mark_err) = self.idempotency.fail(&key, &failure).await {
                    tracing::warn!(error = %mark_err, "Failed to mark idempotency record FAILED");
                }
                tracing::info!(code = %e.code(), message = e.message(), "Order rejected");
                observability::record_order_submitted(e.code().reason());
                Err(e)
            }
        }
    }

    /// Steps 3 to 8, run once the idempotency key is ours.
    async fn accept(
        &self,
        cmd: CreateOrderCommand,
        key: &IdempotencyKey,
    ) -> Result<SubmitOrderResultDto, ServiceError> {
        // 3. Market data acceptance
        let info = self.within(self.market_data.symbol_info(&cmd.symbol)).await?;
        if !info.tradable {
            return Err(ServiceError::new(
                ErrorCode::InvalidSymbol,
                format!("Symbol {} is not tradable", cmd.symbol),
            )
            .with_context("field", "symbol"));
        }
        let quote = self.within(self.market_data.current_price(&cmd.symbol)).await?;
        let hours = self.within(self.market_data.trading_hours(&cmd.symbol)).await?;
        if !hours.is_open {
            return Err(ServiceError::new(
                ErrorCode::MarketClosed,
                format!("Market is closed for {}", cmd.symbol),
            ));
        }

        // 4. Price sanity
        self.settings
            .price_policy
            .check(cmd.order_type, cmd.side, cmd.price, quote.price)?;

        // 5. Business validation
        let mut order = Order::new(cmd)?;
        order.record_market_snapshot(quote.price, Timestamp::now());
        order.validate_invariants()?;
        OrderStateMachine::validate_transition(order.status(), OrderStatus::Processing)?;

        // 6. Persist
        self.orders.save(&order).await?;

        // 7. Enqueue
        if let Err(e) = self
            .broker
            .publish(&BrokerMessage::for_order(order.order_id().clone()))
            .await
        {
            tracing::error!(order_id = %order.order_id(), error = %e, "Publish failed, rolling back order");
            self.roll_back(&order).await;
            return Err(e.into());
        }

        // 8. Mark completed; the order stands even if this fails.
        if let Err(e) = self.idempotency.complete(key, order.order_id()).await {
            tracing::warn!(order_id = %order.order_id(), error = %e, "Failed to mark idempotency record COMPLETED");
        }

        tracing::info!(
            order_id = %order.order_id(),
            order_type = %order.order_type(),
            side = %order.side(),
            "Order accepted"
        );

        Ok(SubmitOrderResultDto {
            order_id: order.order_id().clone(),
            status: order.status(),
            message: ACCEPTED_MESSAGE.to_string(),
            estimated_price: Some(order.price().unwrap_or(quote.price).amount()),
            market_price: Some(quote.price.amount()),
            submitted_at: order.created_at(),
            replayed: false,
        })
    }

    /// Undo step 6: delete the order, else reject it.
    async fn roll_back(&self, order: &Order) {
        match self.orders.delete(order.order_id()).await {
            Ok(true) => return,
            Ok(false) => {
                tracing::warn!(order_id = %order.order_id(), "Order vanished before rollback");
                return;
            }
            Err(e) => tracing::warn!(
                order_id = %order.order_id(),
                error = %e,
                "Rollback delete failed, rejecting order"
            ),
        }

        let reject = OrderStateMachine::transition(OrderStatus::Pending, OrderStatus::Rejected)
            .map(|t| t.with_failure_reason(ErrorCode::BrokerUnavailable.reason()));
        match reject {
            Ok(transition) => {
                if let Err(e) = self.orders.update_status(order.order_id(), &transition).await {
                    tracing::error!(order_id = %order.order_id(), error = %e, "Failed to reject unqueued order");
                }
            }
            Err(e) => tracing::error!(error = %e, "PENDING -> REJECTED must be legal"),
        }
    }

    /// Bound a market data call by the configured deadline.
    async fn within<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, MarketDataError>> + Send,
    {
        let deadline = self.settings.market_data_timeout;
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(MarketDataError::Timeout {
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }
}

/// Shape validation: turn the raw request into a checked command.
fn parse_command(dto: &SubmitOrderDto) -> Result<CreateOrderCommand, ServiceError> {
    if dto.user_id.is_blank() {
        return Err(ServiceError::validation("user_id", "User ID must not be empty"));
    }
    let symbol = Symbol::parse(&dto.symbol)?;
    let side: OrderSide = dto.side.parse()?;
    let order_type: OrderType = dto.order_type.parse()?;

    let cmd = CreateOrderCommand {
        user_id: dto.user_id.clone(),
        symbol,
        side,
        order_type,
        quantity: Quantity::new(dto.quantity),
        price: dto.price.map(Price::new),
    };
    cmd.validate()?;
    Ok(cmd)
}

/// Answer a submission whose fingerprint was already claimed.
fn replay(record: &IdempotencyRecord) -> Result<SubmitOrderResultDto, ServiceError> {
    match record.status {
        IdempotencyStatus::Completed => {
            let order_id = record.order_id.clone().ok_or_else(|| {
                ServiceError::internal(format!("Completed record {} has no order ID", record.key))
            })?;
            tracing::info!(order_id = %order_id, "Idempotent replay");
            observability::record_idempotency_replay();
            observability::record_order_submitted(REPLAYED_OUTCOME);
            Ok(SubmitOrderResultDto {
                order_id,
                status: OrderStatus::Pending,
                message: REPLAY_MESSAGE.to_string(),
                estimated_price: None,
                market_price: None,
                submitted_at: record.created_at,
                replayed: true,
            })
        }
        IdempotencyStatus::Pending => {
            observability::record_order_submitted(ErrorCode::InProgress.reason());
            Err(ServiceError::new(
                ErrorCode::InProgress,
                "An identical order is already being submitted",
            ))
        }
        IdempotencyStatus::Failed => {
            observability::record_order_submitted(ErrorCode::PriorFailure.reason());
            let prior = record.error.clone().unwrap_or(RecordedFailure {
                code: ErrorCode::Internal.reason().to_string(),
                message: String::new(),
            });
            Err(ServiceError::new(
                ErrorCode::PriorFailure,
                format!("An identical order failed recently: {}", prior.message),
            )
            .with_context("prior_code", prior.code)
            .with_context("prior_message", prior.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        BrokerError, Delivery, MockMarketDataPort, PriceQuote, SymbolInfo, TradingHours,
    };
    use crate::domain::shared::{OrderId, UserId};
    use crate::infrastructure::broker::InMemoryOrderBroker;
    use crate::infrastructure::idempotency::InMemoryIdempotencyStore;
    use crate::infrastructure::marketdata::StaticMarketData;
    use crate::infrastructure::persistence::InMemoryOrderRepository;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    type TestUseCase<M, B> =
        SubmitOrderUseCase<InMemoryOrderRepository, InMemoryIdempotencyStore, M, B>;

    struct Harness<M: MarketDataPort, B: OrderBroker> {
        orders: Arc<InMemoryOrderRepository>,
        idempotency: Arc<InMemoryIdempotencyStore>,
        broker: Arc<B>,
        use_case: TestUseCase<M, B>,
    }

    fn harness<M: MarketDataPort, B: OrderBroker>(market_data: M, broker: B) -> Harness<M, B> {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let broker = Arc::new(broker);
        let use_case = SubmitOrderUseCase::new(
            Arc::clone(&orders),
            Arc::clone(&idempotency),
            Arc::new(market_data),
            Arc::clone(&broker),
            SubmissionSettings {
                market_data_timeout: Duration::from_millis(50),
                ..SubmissionSettings::default()
            },
        );
        Harness {
            orders,
            idempotency,
            broker,
            use_case,
        }
    }

    fn market() -> StaticMarketData {
        StaticMarketData::new().with_price("AAPL", dec!(150.00))
    }

    fn limit_buy(price: Decimal) -> SubmitOrderDto {
        SubmitOrderDto {
            user_id: UserId::new("u1"),
            symbol: "aapl".to_string(),
            side: "BUY".to_string(),
            order_type: "LIMIT".to_string(),
            quantity: dec!(10),
            price: Some(price),
        }
    }

    async fn record_for(
        h: &Harness<impl MarketDataPort, impl OrderBroker>,
        dto: &SubmitOrderDto,
    ) -> IdempotencyRecord {
        let cmd = parse_command(dto).unwrap();
        let key = IdempotencyKey::new(
            cmd.user_id.clone(),
            Fingerprint::compute(
                &cmd.user_id,
                &cmd.symbol,
                cmd.order_type,
                cmd.side,
                cmd.quantity,
                cmd.price,
            ),
        );
        h.idempotency.get(&key).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn accepts_limit_order_and_queues_it() {
        let h = harness(market(), InMemoryOrderBroker::new());
        let dto = limit_buy(dec!(150.50));

        let result = h.use_case.execute(dto.clone()).await.unwrap();

        assert_eq!(result.status, OrderStatus::Pending);
        assert_eq!(result.message, ACCEPTED_MESSAGE);
        assert_eq!(result.market_price, Some(dec!(150.00)));
        assert_eq!(result.estimated_price, Some(dec!(150.50)));
        assert!(!result.replayed);

        let order = h.orders.find_by_id(&result.order_id).await.unwrap().unwrap();
        assert_eq!(order.symbol().as_str(), "AAPL");
        assert_eq!(order.market_price_at_submission(), Some(Price::new(dec!(150.00))));
        assert!(order.market_data_timestamp().is_some());
        assert_eq!(h.broker.published_count(), 1);

        let record = record_for(&h, &dto).await;
        assert_eq!(record.status, IdempotencyStatus::Completed);
        assert_eq!(record.order_id, Some(result.order_id));
    }

    #[tokio::test]
    async fn replay_returns_same_order_without_side_effects() {
        let h = harness(market(), InMemoryOrderBroker::new());

        let first = h.use_case.execute(limit_buy(dec!(150.50))).await.unwrap();
        // Different text, same fingerprint.
        let mut again = limit_buy(dec!(150.50000));
        again.symbol = " AAPL ".to_string();
        let second = h.use_case.execute(again).await.unwrap();

        assert_eq!(first.order_id, second.order_id);
        assert!(second.replayed);
        assert_eq!(second.message, REPLAY_MESSAGE);
        assert_eq!(second.status, OrderStatus::Pending);
        assert_eq!(h.broker.published_count(), 1);
        assert_eq!(h.orders.len(), 1);
    }

    #[test]
    fn replay_counts_as_replayed_submission() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut record = IdempotencyRecord::pending("k".to_string(), UserId::new("u1"), 60);
        record.complete(OrderId::generate());

        let result = metrics::with_local_recorder(&recorder, || replay(&record)).unwrap();

        assert!(result.replayed);
        let rendered = handle.render();
        assert!(
            rendered.contains(r#"orders_submitted_total{outcome="replayed"} 1"#),
            "{rendered}"
        );
        assert!(rendered.contains("idempotency_replays_total 1"), "{rendered}");
    }

    #[tokio::test]
    async fn pending_record_means_in_progress() {
        let h = harness(market(), InMemoryOrderBroker::new());
        let dto = limit_buy(dec!(150.50));
        let cmd = parse_command(&dto).unwrap();
        let key = IdempotencyKey::new(
            cmd.user_id.clone(),
            Fingerprint::compute(
                &cmd.user_id,
                &cmd.symbol,
                cmd.order_type,
                cmd.side,
                cmd.quantity,
                cmd.price,
            ),
        );
        h.idempotency.try_begin(&key, 60).await.unwrap();

        let err = h.use_case.execute(dto).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InProgress);
        assert!(h.orders.is_empty());
    }

    #[tokio::test]
    async fn market_closed_rejects_and_records_failure() {
        let md = market();
        md.set_market_open(false);
        let h = harness(md, InMemoryOrderBroker::new());
        let dto = limit_buy(dec!(150.50));

        let err = h.use_case.execute(dto.clone()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MarketClosed);
        assert!(h.orders.is_empty());
        assert_eq!(h.broker.published_count(), 0);

        let record = record_for(&h, &dto).await;
        assert_eq!(record.status, IdempotencyStatus::Failed);
        assert_eq!(record.error.unwrap().code, "MARKET_CLOSED");

        let replay = h.use_case.execute(dto).await.unwrap_err();
        assert_eq!(replay.code(), ErrorCode::PriorFailure);
        assert_eq!(replay.context_value("prior_code"), Some("MARKET_CLOSED"));
    }

    #[tokio::test]
    async fn limit_price_out_of_band_is_rejected() {
        let h = harness(market(), InMemoryOrderBroker::new());
        let err = h.use_case.execute(limit_buy(dec!(200.00))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PriceOutOfRange);
        assert!(h.orders.is_empty());
    }

    #[tokio::test]
    async fn unknown_symbol_is_invalid_symbol() {
        let h = harness(StaticMarketData::new(), InMemoryOrderBroker::new());
        let err = h.use_case.execute(limit_buy(dec!(150))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSymbol);
    }

    #[tokio::test]
    async fn untradable_symbol_is_invalid_symbol() {
        let mut md = MockMarketDataPort::new();
        md.expect_symbol_info().returning(|s| {
            Ok(SymbolInfo {
                symbol: s.clone(),
                tradable: false,
                name: None,
            })
        });
        md.expect_current_price().never();
        let h = harness(md, InMemoryOrderBroker::new());
        let err = h.use_case.execute(limit_buy(dec!(150))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSymbol);
    }

    #[tokio::test]
    async fn provider_error_is_market_data_unavailable() {
        let mut md = MockMarketDataPort::new();
        md.expect_symbol_info().returning(|s| {
            Ok(SymbolInfo {
                symbol: s.clone(),
                tradable: true,
                name: None,
            })
        });
        md.expect_current_price().returning(|_| {
            Err(MarketDataError::ConnectionError {
                message: "refused".to_string(),
            })
        });
        md.expect_trading_hours().never();
        let h = harness(md, InMemoryOrderBroker::new());
        let err = h.use_case.execute(limit_buy(dec!(150))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MarketDataUnavailable);
    }

    struct SlowMarketData;

    #[async_trait]
    impl MarketDataPort for SlowMarketData {
        async fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, MarketDataError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SymbolInfo {
                symbol: symbol.clone(),
                tradable: true,
                name: None,
            })
        }

        async fn current_price(&self, _symbol: &Symbol) -> Result<PriceQuote, MarketDataError> {
            unreachable!("symbol_info never returns in time")
        }

        async fn trading_hours(&self, _symbol: &Symbol) -> Result<TradingHours, MarketDataError> {
            unreachable!("symbol_info never returns in time")
        }
    }

    #[tokio::test]
    async fn slow_provider_is_bounded_by_deadline() {
        let h = harness(SlowMarketData, InMemoryOrderBroker::new());
        let err = h.use_case.execute(limit_buy(dec!(150))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MarketDataUnavailable);
        assert!(err.message().contains("timed out"));
    }

    #[tokio::test]
    async fn shape_errors_are_validation() {
        let h = harness(market(), InMemoryOrderBroker::new());

        let mut bad_side = limit_buy(dec!(150));
        bad_side.side = "HOLD".to_string();
        assert_eq!(
            h.use_case.execute(bad_side).await.unwrap_err().code(),
            ErrorCode::Validation
        );

        let mut market_with_price = limit_buy(dec!(150));
        market_with_price.order_type = "MARKET".to_string();
        assert_eq!(
            h.use_case.execute(market_with_price).await.unwrap_err().code(),
            ErrorCode::Validation
        );

        let mut zero_qty = limit_buy(dec!(150));
        zero_qty.quantity = Decimal::ZERO;
        assert_eq!(
            h.use_case.execute(zero_qty).await.unwrap_err().code(),
            ErrorCode::Validation
        );

        let mut blank_user = limit_buy(dec!(150));
        blank_user.user_id = UserId::new(" ");
        assert_eq!(
            h.use_case.execute(blank_user).await.unwrap_err().code(),
            ErrorCode::Validation
        );

        // Nothing was claimed for malformed requests.
        assert!(h.idempotency.is_empty());
    }

    struct RefusingBroker;

    #[async_trait]
    impl OrderBroker for RefusingBroker {
        async fn publish(&self, _message: &BrokerMessage) -> Result<(), BrokerError> {
            Err(BrokerError::Unavailable("no confirm".to_string()))
        }
        async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
            Ok(None)
        }
        async fn ack(&self, d: &Delivery) -> Result<(), BrokerError> {
            Err(BrokerError::UnknownDelivery(d.tag))
        }
        async fn nack_requeue(&self, d: &Delivery, _reason: &str) -> Result<(), BrokerError> {
            Err(BrokerError::UnknownDelivery(d.tag))
        }
        async fn nack_dead_letter(&self, d: &Delivery, _reason: &str) -> Result<(), BrokerError> {
            Err(BrokerError::UnknownDelivery(d.tag))
        }
        async fn health_check(&self) -> Result<(), BrokerError> {
            Err(BrokerError::Unavailable("down".to_string()))
        }
        fn close(&self) {}
    }

    #[tokio::test]
    async fn publish_failure_rolls_back_the_order() {
        let h = harness(market(), RefusingBroker);
        let dto = limit_buy(dec!(150.50));

        let err = h.use_case.execute(dto.clone()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BrokerUnavailable);
        assert!(h.orders.is_empty());

        let record = record_for(&h, &dto).await;
        assert_eq!(record.status, IdempotencyStatus::Failed);
        assert_eq!(record.error.unwrap().code, "BROKER_UNAVAILABLE");
    }

    #[tokio::test]
    async fn market_orders_estimate_at_market() {
        let h = harness(market(), InMemoryOrderBroker::new());
        let dto = SubmitOrderDto {
            order_type: "market".to_string(),
            side: "sell".to_string(),
            price: None,
            ..limit_buy(dec!(0))
        };
        let result = h.use_case.execute(dto).await.unwrap();
        assert_eq!(result.estimated_price, Some(dec!(150.00)));
        let order = h.orders.find_by_id(&result.order_id).await.unwrap().unwrap();
        assert_eq!(order.order_type(), OrderType::Market);
        assert_eq!(order.side(), OrderSide::Sell);
        assert_eq!(order.price(), None);
    }
}
