//! Process Order Use Case
//!
//! One worker step: take a delivery off the broker, drive the order through
//! PROCESSING to a terminal status and settle the delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::ports::{
    BrokerError, Delivery, ExecutionFailure, ExecutionReport, OrderBroker, OrderExecutor,
};
use crate::domain::order_lifecycle::{
    CasOutcome, Order, OrderRepository, OrderStateMachine, OrderStatus,
};
use crate::error::ErrorCode;
use crate::observability;

/// Retry and deadline policy for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSettings {
    /// Redeliveries allowed before a retryable failure becomes terminal.
    pub max_redeliveries: u32,
    /// Deadline for one execution attempt.
    pub processing_timeout: Duration,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_redeliveries: 5,
            processing_timeout: Duration::from_secs(30),
        }
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Order EXECUTED, delivery acked.
    Executed,
    /// Order was cancelled while in flight; result discarded, delivery acked.
    Cancelled,
    /// Order was not PENDING or another consumer claimed it; delivery acked.
    Skipped(OrderStatus),
    /// Retryable failure; order back to PENDING, delivery requeued.
    Requeued(ErrorCode),
    /// Order FAILED, delivery acked.
    Failed(ErrorCode),
    /// Delivery dead-lettered with the given reason.
    DeadLettered(String),
}

impl ProcessOutcome {
    const fn label(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
            Self::Skipped(_) => "skipped",
            Self::Requeued(_) => "requeued",
            Self::Failed(_) => "failed",
            Self::DeadLettered(_) => "dead_lettered",
        }
    }
}

/// A failure classified by code for the retry decision.
struct Attempt {
    code: ErrorCode,
    message: String,
}

impl Attempt {
    fn reason(&self) -> String {
        format!("{}: {}", self.code.reason(), self.message)
    }
}

impl From<ExecutionFailure> for Attempt {
    fn from(failure: ExecutionFailure) -> Self {
        Self {
            code: failure.code(),
            message: failure.to_string(),
        }
    }
}

/// Worker step logic shared by every consumer in the pool.
pub struct ProcessOrderUseCase<R, B, E>
where
    R: OrderRepository,
    B: OrderBroker,
    E: OrderExecutor,
{
    orders: Arc<R>,
    broker: Arc<B>,
    executor: Arc<E>,
    settings: ProcessingSettings,
}

impl<R, B, E> ProcessOrderUseCase<R, B, E>
where
    R: OrderRepository,
    B: OrderBroker,
    E: OrderExecutor,
{
    /// Create a new `ProcessOrderUseCase`.
    pub const fn new(
        orders: Arc<R>,
        broker: Arc<B>,
        executor: Arc<E>,
        settings: ProcessingSettings,
    ) -> Self {
        Self {
            orders,
            broker,
            executor,
            settings,
        }
    }

    /// The broker this use case settles deliveries on.
    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Process one delivery and settle it.
    ///
    /// # Errors
    ///
    /// Returns error only if settling the delivery on the broker fails.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %delivery.message.order_id, redelivery_count = delivery.redelivery_count)
    )]
    pub async fn handle(&self, delivery: &Delivery) -> Result<ProcessOutcome, BrokerError> {
        let started = Instant::now();
        let outcome = self.run(delivery).await?;
        observability::record_order_processed(outcome.label());
        observability::record_processing_duration(started.elapsed().as_secs_f64());
        tracing::debug!(outcome = ?outcome, "Delivery settled");
        Ok(outcome)
    }

    async fn run(&self, delivery: &Delivery) -> Result<ProcessOutcome, BrokerError> {
        let order_id = &delivery.message.order_id;

        let order = match self.orders.find_by_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!("Order not found, dead-lettering");
                return self
                    .dead_letter(delivery, ErrorCode::OrderNotFound.reason().to_string())
                    .await;
            }
            Err(e) => {
                // Nothing claimed yet, so only the delivery needs settling.
                let attempt = Attempt {
                    code: ErrorCode::TransientStore,
                    message: e.to_string(),
                };
                return if self.can_retry(delivery) {
                    self.requeue(delivery, &attempt).await
                } else {
                    self.dead_letter(delivery, attempt.reason()).await
                };
            }
        };

        if order.status() == OrderStatus::Processing {
            // Only one message exists per order, so a PROCESSING order on a
            // delivery means the attempt that claimed it never settled.
            let attempt = Attempt {
                code: ErrorCode::ProcessingTimeout,
                message: "previous processing attempt was interrupted".to_string(),
            };
            return if self.can_retry(delivery) {
                self.revert_and_requeue(delivery, &attempt).await
            } else {
                tracing::warn!("Interrupted order out of redeliveries");
                self.fail(delivery, &attempt, true).await
            };
        }

        if order.status() != OrderStatus::Pending {
            tracing::debug!(status = %order.status(), "Order already progressed");
            self.broker.ack(delivery).await?;
            return Ok(ProcessOutcome::Skipped(order.status()));
        }

        let claim = match OrderStateMachine::transition(OrderStatus::Pending, OrderStatus::Processing) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "PENDING -> PROCESSING must be legal");
                return self.dead_letter(delivery, ErrorCode::Internal.reason().to_string()).await;
            }
        };
        let order = match self.orders.update_status(order_id, &claim).await {
            Ok(CasOutcome::Applied(order)) => order,
            Ok(CasOutcome::Conflict { actual }) => {
                tracing::debug!(actual = ?actual, "Claim lost");
                self.broker.ack(delivery).await?;
                return Ok(ProcessOutcome::Skipped(actual.unwrap_or(OrderStatus::Pending)));
            }
            Err(e) => {
                let attempt = Attempt {
                    code: ErrorCode::TransientStore,
                    message: e.to_string(),
                };
                return if self.can_retry(delivery) {
                    self.requeue(delivery, &attempt).await
                } else {
                    self.dead_letter(delivery, attempt.reason()).await
                };
            }
        };

        match self.execute(&order).await {
            Ok(report) => self.record_execution(delivery, &order, report).await,
            Err(attempt) if attempt.code.is_retryable() => {
                if self.can_retry(delivery) {
                    self.revert_and_requeue(delivery, &attempt).await
                } else {
                    tracing::warn!(code = %attempt.code, "Redeliveries exhausted");
                    self.fail(delivery, &attempt, true).await
                }
            }
            Err(attempt) => self.fail(delivery, &attempt, false).await,
        }
    }

    /// Run the executor under the processing deadline.
    async fn execute(&self, order: &Order) -> Result<ExecutionReport, Attempt> {
        let deadline = self.settings.processing_timeout;
        match tokio::time::timeout(deadline, self.executor.execute(order)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(Attempt {
                code: ErrorCode::ProcessingTimeout,
                message: format!("processing exceeded {} ms", deadline.as_millis()),
            }),
        }
    }

    async fn record_execution(
        &self,
        delivery: &Delivery,
        order: &Order,
        report: ExecutionReport,
    ) -> Result<ProcessOutcome, BrokerError> {
        // Cooperative cancellation check.
        let current = self.orders.find_by_id(order.order_id()).await;
        if matches!(&current, Ok(Some(o)) if o.status() == OrderStatus::Cancelled) {
            tracing::info!("Order cancelled during processing, discarding result");
            self.broker.ack(delivery).await?;
            return Ok(ProcessOutcome::Cancelled);
        }

        let execution = OrderStateMachine::execute(report.execution_price, report.executed_at);
        match self.orders.update_execution(order.order_id(), &execution).await {
            Ok(CasOutcome::Applied(executed)) => {
                tracing::info!(execution_price = ?executed.execution_price(), "Order executed");
                self.broker.ack(delivery).await?;
                Ok(ProcessOutcome::Executed)
            }
            Ok(CasOutcome::Conflict { actual }) => {
                let status = actual.unwrap_or(OrderStatus::Cancelled);
                tracing::info!(actual = ?actual, "Execution write lost, discarding result");
                self.broker.ack(delivery).await?;
                if status == OrderStatus::Cancelled {
                    Ok(ProcessOutcome::Cancelled)
                } else {
                    Ok(ProcessOutcome::Skipped(status))
                }
            }
            Err(e) => {
                let attempt = Attempt {
                    code: ErrorCode::TransientStore,
                    message: e.to_string(),
                };
                if self.can_retry(delivery) {
                    self.revert_and_requeue(delivery, &attempt).await
                } else {
                    self.fail(delivery, &attempt, true).await
                }
            }
        }
    }

    const fn can_retry(&self, delivery: &Delivery) -> bool {
        delivery.redelivery_count < self.settings.max_redeliveries
    }

    async fn revert_and_requeue(
        &self,
        delivery: &Delivery,
        attempt: &Attempt,
    ) -> Result<ProcessOutcome, BrokerError> {
        let order_id = &delivery.message.order_id;
        let revert = match OrderStateMachine::transition(OrderStatus::Processing, OrderStatus::Pending) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "PROCESSING -> PENDING must be legal");
                return self.dead_letter(delivery, attempt.reason()).await;
            }
        };
        match self.orders.update_status(order_id, &revert).await {
            Ok(CasOutcome::Applied(_)) => self.requeue(delivery, attempt).await,
            Ok(CasOutcome::Conflict { actual }) => {
                tracing::info!(actual = ?actual, "Order moved on before revert");
                self.broker.ack(delivery).await?;
                Ok(match actual {
                    Some(OrderStatus::Cancelled) | None => ProcessOutcome::Cancelled,
                    Some(status) => ProcessOutcome::Skipped(status),
                })
            }
            // Left PROCESSING; requeueing would only be skipped, so give up.
            Err(e) => {
                tracing::error!(error = %e, "Failed to revert order to PENDING");
                self.dead_letter(delivery, attempt.reason()).await
            }
        }
    }

    async fn requeue(
        &self,
        delivery: &Delivery,
        attempt: &Attempt,
    ) -> Result<ProcessOutcome, BrokerError> {
        tracing::warn!(code = %attempt.code, message = %attempt.message, "Retryable failure, requeueing");
        self.broker.nack_requeue(delivery, &attempt.reason()).await?;
        Ok(ProcessOutcome::Requeued(attempt.code))
    }

    /// PROCESSING -> FAILED, then ack or dead-letter the delivery.
    async fn fail(
        &self,
        delivery: &Delivery,
        attempt: &Attempt,
        dead_letter: bool,
    ) -> Result<ProcessOutcome, BrokerError> {
        let order_id = &delivery.message.order_id;
        let reason = attempt.reason();
        let outcome = match OrderStateMachine::transition(OrderStatus::Processing, OrderStatus::Failed)
        {
            Ok(t) => self
                .orders
                .update_status(order_id, &t.with_failure_reason(reason.clone()))
                .await,
            Err(e) => {
                tracing::error!(error = %e, "PROCESSING -> FAILED must be legal");
                return self.dead_letter(delivery, reason).await;
            }
        };

        match outcome {
            Ok(CasOutcome::Applied(_)) => {
                tracing::warn!(code = %attempt.code, message = %attempt.message, "Order failed");
            }
            Ok(CasOutcome::Conflict { actual: Some(OrderStatus::Cancelled) }) => {
                self.broker.ack(delivery).await?;
                return Ok(ProcessOutcome::Cancelled);
            }
            Ok(CasOutcome::Conflict { actual }) => {
                tracing::warn!(actual = ?actual, "Order moved on before FAILED write");
            }
            Err(e) => tracing::error!(error = %e, "Failed to mark order FAILED"),
        }

        if dead_letter {
            self.dead_letter(delivery, reason).await
        } else {
            self.broker.ack(delivery).await?;
            Ok(ProcessOutcome::Failed(attempt.code))
        }
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        reason: String,
    ) -> Result<ProcessOutcome, BrokerError> {
        self.broker.nack_dead_letter(delivery, &reason).await?;
        let label = reason.split(':').next().unwrap_or(&reason).to_string();
        observability::record_dead_letter(&label);
        Ok(ProcessOutcome::DeadLettered(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BrokerMessage;
    use crate::domain::order_lifecycle::{
        CancelReason, CreateOrderCommand, OrderSide, OrderType, StatusTransition,
    };
    use crate::domain::shared::{OrderId, Price, Quantity, Symbol, Timestamp, UserId};
    use crate::infrastructure::broker::InMemoryOrderBroker;
    use crate::infrastructure::execution::SimulatedExecutor;
    use crate::infrastructure::persistence::InMemoryOrderRepository;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    /// Executor that replays a script of results, then fills.
    #[derive(Default)]
    struct ScriptedExecutor {
        script: Mutex<Vec<ExecutionFailure>>,
        cancel_via: Option<Arc<InMemoryOrderRepository>>,
    }

    impl ScriptedExecutor {
        fn failing(failures: Vec<ExecutionFailure>) -> Self {
            Self {
                script: Mutex::new(failures),
                cancel_via: None,
            }
        }
    }

    #[async_trait]
    impl OrderExecutor for ScriptedExecutor {
        async fn execute(&self, order: &Order) -> Result<ExecutionReport, ExecutionFailure> {
            if let Some(repo) = &self.cancel_via {
                let t = OrderStateMachine::transition(OrderStatus::Processing, OrderStatus::Cancelled)
                    .unwrap()
                    .with_cancel_reason(CancelReason::UserRequested);
                assert!(repo.update_status(order.order_id(), &t).await.unwrap().is_applied());
            }
            let next = {
                let mut script = self.script.lock();
                if script.is_empty() { None } else { Some(script.remove(0)) }
            };
            match next {
                Some(failure) => Err(failure),
                None => Ok(ExecutionReport {
                    execution_price: Price::new(dec!(150.25)),
                    executed_at: Timestamp::now(),
                }),
            }
        }
    }

    struct Fixture<E: OrderExecutor> {
        orders: Arc<InMemoryOrderRepository>,
        broker: Arc<InMemoryOrderBroker>,
        use_case: ProcessOrderUseCase<InMemoryOrderRepository, InMemoryOrderBroker, E>,
    }

    fn fixture_with<E: OrderExecutor>(
        orders: Arc<InMemoryOrderRepository>,
        executor: E,
        settings: ProcessingSettings,
    ) -> Fixture<E> {
        let broker = Arc::new(InMemoryOrderBroker::new());
        let use_case = ProcessOrderUseCase::new(
            Arc::clone(&orders),
            Arc::clone(&broker),
            Arc::new(executor),
            settings,
        );
        Fixture {
            orders,
            broker,
            use_case,
        }
    }

    fn fixture<E: OrderExecutor>(executor: E) -> Fixture<E> {
        fixture_with(
            Arc::new(InMemoryOrderRepository::new()),
            executor,
            ProcessingSettings {
                max_redeliveries: 2,
                processing_timeout: Duration::from_millis(100),
            },
        )
    }

    async fn submit<E: OrderExecutor>(f: &Fixture<E>) -> OrderId {
        let order = Order::new(CreateOrderCommand {
            user_id: UserId::new("u1"),
            symbol: Symbol::new("AAPL"),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: Quantity::from_i64(10),
            price: Some(Price::new(dec!(150.50))),
        })
        .unwrap();
        f.orders.save(&order).await.unwrap();
        f.broker
            .publish(&BrokerMessage::for_order(order.order_id().clone()))
            .await
            .unwrap();
        order.order_id().clone()
    }

    async fn next<E: OrderExecutor>(f: &Fixture<E>) -> Delivery {
        f.broker.receive().await.unwrap().unwrap()
    }

    async fn status_of<E: OrderExecutor>(f: &Fixture<E>, id: &OrderId) -> Order {
        f.orders.find_by_id(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn happy_path_executes_and_acks() {
        let f = fixture(SimulatedExecutor::new());
        let id = submit(&f).await;

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Executed);
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Executed);
        assert_eq!(order.execution_price(), Some(Price::new(dec!(150.50))));
        assert!(order.executed_at().is_some());
        assert_eq!(f.broker.in_flight_len(), 0);
        assert_eq!(f.broker.ready_len(), 0);
    }

    #[tokio::test]
    async fn missing_order_is_dead_lettered() {
        let f = fixture(SimulatedExecutor::new());
        f.broker
            .publish(&BrokerMessage::for_order(OrderId::new("ghost")))
            .await
            .unwrap();

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::DeadLettered("ORDER_NOT_FOUND".to_string()));
        let dead = f.broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "ORDER_NOT_FOUND");
    }

    #[tokio::test]
    async fn non_pending_order_is_acked_unchanged() {
        let f = fixture(SimulatedExecutor::new());
        let id = submit(&f).await;
        let cancel = OrderStateMachine::transition(OrderStatus::Pending, OrderStatus::Cancelled).unwrap();
        f.orders.update_status(&id, &cancel).await.unwrap();

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(OrderStatus::Cancelled));
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.execution_price().is_none());
        assert_eq!(f.broker.in_flight_len(), 0);
    }

    fn claim() -> StatusTransition {
        OrderStateMachine::transition(OrderStatus::Pending, OrderStatus::Processing).unwrap()
    }

    #[tokio::test]
    async fn interrupted_claim_is_reverted_and_requeued() {
        let f = fixture(SimulatedExecutor::new());
        let id = submit(&f).await;
        // A worker claimed the order and died before settling the message.
        f.orders.update_status(&id, &claim()).await.unwrap();

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Requeued(ErrorCode::ProcessingTimeout));
        assert_eq!(status_of(&f, &id).await.status(), OrderStatus::Pending);
        assert_eq!(f.broker.ready_len(), 1);

        let retried = f.use_case.handle(&next(&f).await).await.unwrap();
        assert_eq!(retried, ProcessOutcome::Executed);
        assert_eq!(status_of(&f, &id).await.status(), OrderStatus::Executed);
    }

    #[tokio::test]
    async fn interrupted_claim_without_budget_is_dead_lettered() {
        let f = fixture(SimulatedExecutor::new());
        let id = submit(&f).await;
        for _ in 0..2 {
            let delivery = next(&f).await;
            f.broker.nack_requeue(&delivery, "BROKER_TIMEOUT: lost").await.unwrap();
        }
        f.orders.update_status(&id, &claim()).await.unwrap();

        let delivery = next(&f).await;
        assert_eq!(delivery.redelivery_count, 2);
        let outcome = f.use_case.handle(&delivery).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::DeadLettered(ref r) if r.starts_with("PROCESSING_TIMEOUT")));
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.failure_reason().unwrap().starts_with("PROCESSING_TIMEOUT"));
        assert_eq!(f.broker.dead_letters().len(), 1);
        assert_eq!(f.broker.ready_len(), 0);
    }

    #[tokio::test]
    async fn retryable_failure_reverts_and_requeues_then_succeeds() {
        let f = fixture(ScriptedExecutor::failing(vec![
            ExecutionFailure::MarketDataTimeout("slow".into()),
        ]));
        let id = submit(&f).await;

        let first = f.use_case.handle(&next(&f).await).await.unwrap();
        assert_eq!(first, ProcessOutcome::Requeued(ErrorCode::MarketDataTimeout));
        assert_eq!(status_of(&f, &id).await.status(), OrderStatus::Pending);

        let redelivered = next(&f).await;
        assert_eq!(redelivered.redelivery_count, 1);
        let second = f.use_case.handle(&redelivered).await.unwrap();
        assert_eq!(second, ProcessOutcome::Executed);
        assert_eq!(status_of(&f, &id).await.status(), OrderStatus::Executed);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_and_dead_letter() {
        let f = fixture(ScriptedExecutor::failing(vec![
            ExecutionFailure::TransientStore("locked".into()),
            ExecutionFailure::TransientStore("locked".into()),
            ExecutionFailure::TransientStore("locked".into()),
        ]));
        let id = submit(&f).await;

        for expected_count in 0..2 {
            let d = next(&f).await;
            assert_eq!(d.redelivery_count, expected_count);
            assert!(matches!(
                f.use_case.handle(&d).await.unwrap(),
                ProcessOutcome::Requeued(ErrorCode::TransientStore)
            ));
        }
        let last = next(&f).await;
        assert_eq!(last.redelivery_count, 2);
        let outcome = f.use_case.handle(&last).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::DeadLettered(ref r) if r.starts_with("TRANSIENT_STORE")));
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.failure_reason().unwrap().starts_with("TRANSIENT_STORE"));
        let dead = f.broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].redelivery_count, 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_fails_and_acks() {
        let f = fixture(ScriptedExecutor::failing(vec![ExecutionFailure::Failed(
            "rejected by venue".into(),
        )]));
        let id = submit(&f).await;

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Failed(ErrorCode::ProcessingFailed));
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.failure_reason().unwrap().contains("rejected by venue"));
        assert!(f.broker.dead_letters().is_empty());
        assert_eq!(f.broker.ready_len(), 0);
    }

    #[tokio::test]
    async fn cancellation_during_processing_discards_result() {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let executor = ScriptedExecutor {
            cancel_via: Some(Arc::clone(&orders)),
            ..ScriptedExecutor::default()
        };
        let f = fixture_with(orders, executor, ProcessingSettings::default());
        let id = submit(&f).await;

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        let order = status_of(&f, &id).await;
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.execution_price().is_none());
        assert!(order.executed_at().is_none());
        assert_eq!(f.broker.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn deadline_overrun_is_retryable() {
        let f = fixture(SimulatedExecutor::with_latency(Duration::from_secs(5)));
        let id = submit(&f).await;

        let outcome = f.use_case.handle(&next(&f).await).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Requeued(ErrorCode::ProcessingTimeout));
        assert_eq!(status_of(&f, &id).await.status(), OrderStatus::Pending);
        assert_eq!(f.broker.ready_len(), 1);
    }
}
