//! Worker Pool
//!
//! A fixed number of consumers sharing one broker channel. Each consumer
//! hands deliveries to [`ProcessOrderUseCase`] until shutdown. A delivery
//! runs in its own task, so a panicking handler costs that delivery one
//! redelivery and leaves the consumer running.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Delivery, OrderBroker, OrderExecutor};
use crate::application::use_cases::ProcessOrderUseCase;
use crate::domain::order_lifecycle::OrderRepository;

/// Pause after a broker receive error before trying again.
const RECEIVE_BACKOFF: Duration = Duration::from_millis(500);

/// Requeue reason for a delivery whose handler panicked.
const PANICKED_REASON: &str = "handler panicked";

/// Starts the consumer tasks.
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `concurrency` consumers (at least one).
    pub fn start<R, B, E>(
        use_case: Arc<ProcessOrderUseCase<R, B, E>>,
        concurrency: usize,
    ) -> WorkerPoolHandle
    where
        R: OrderRepository + 'static,
        B: OrderBroker + 'static,
        E: OrderExecutor + 'static,
    {
        let shutdown = CancellationToken::new();
        let broker: Arc<dyn OrderBroker> = Arc::clone(use_case.broker()) as Arc<dyn OrderBroker>;
        let workers = concurrency.max(1);

        let tasks = (0..workers)
            .map(|worker| {
                let use_case = Arc::clone(&use_case);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { consume(worker, use_case, shutdown).await })
            })
            .collect();

        tracing::info!(workers, "Worker pool started");
        WorkerPoolHandle {
            shutdown,
            broker,
            tasks,
        }
    }
}

/// Handle to a running pool.
pub struct WorkerPoolHandle {
    shutdown: CancellationToken,
    broker: Arc<dyn OrderBroker>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Number of consumer tasks.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.tasks.len()
    }

    /// Token cancelled when shutdown begins.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop consuming and wait for every worker to finish its current step.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.broker.close();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn consume<R, B, E>(
    worker: usize,
    use_case: Arc<ProcessOrderUseCase<R, B, E>>,
    shutdown: CancellationToken,
) where
    R: OrderRepository + 'static,
    B: OrderBroker + 'static,
    E: OrderExecutor + 'static,
{
    tracing::debug!(worker, "Worker started");
    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            received = use_case.broker().receive() => received,
        };

        match received {
            Ok(Some(delivery)) => process(worker, &use_case, delivery).await,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(worker, error = %e, "Broker receive failed");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                }
            }
        }
    }
    tracing::debug!(worker, "Worker stopped");
}

async fn process<R, B, E>(
    worker: usize,
    use_case: &Arc<ProcessOrderUseCase<R, B, E>>,
    delivery: Delivery,
) where
    R: OrderRepository + 'static,
    B: OrderBroker + 'static,
    E: OrderExecutor + 'static,
{
    let task = {
        let use_case = Arc::clone(use_case);
        let delivery = delivery.clone();
        tokio::spawn(async move { use_case.handle(&delivery).await })
    };

    match task.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::error!(
                worker,
                order_id = %delivery.message.order_id,
                error = %e,
                "Failed to settle delivery"
            );
        }
        Err(e) => {
            tracing::error!(
                worker,
                order_id = %delivery.message.order_id,
                error = %e,
                "Delivery handler panicked, requeueing"
            );
            if let Err(e) = use_case.broker().nack_requeue(&delivery, PANICKED_REASON).await {
                tracing::error!(
                    worker,
                    order_id = %delivery.message.order_id,
                    error = %e,
                    "Failed to requeue delivery after panic"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BrokerMessage, ExecutionFailure, ExecutionReport};
    use crate::application::use_cases::ProcessingSettings;
    use crate::domain::order_lifecycle::{
        CreateOrderCommand, Order, OrderSide, OrderStatus, OrderType,
    };
    use crate::domain::shared::{OrderId, Price, Quantity, Symbol, UserId};
    use crate::infrastructure::broker::InMemoryOrderBroker;
    use crate::infrastructure::execution::SimulatedExecutor;
    use crate::infrastructure::persistence::InMemoryOrderRepository;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn limit_order(i: usize) -> Order {
        Order::new(CreateOrderCommand {
            user_id: UserId::new("u1"),
            symbol: Symbol::new(format!("S{i}")),
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            quantity: Quantity::from_i64(1),
            price: Some(Price::new(dec!(10))),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn pool_drains_queue_and_shuts_down() {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let broker = Arc::new(InMemoryOrderBroker::new());
        let use_case = Arc::new(ProcessOrderUseCase::new(
            Arc::clone(&orders),
            Arc::clone(&broker),
            Arc::new(SimulatedExecutor::with_latency(Duration::from_millis(5))),
            ProcessingSettings::default(),
        ));
        let pool = WorkerPool::start(use_case, 4);
        assert_eq!(pool.workers(), 4);

        let mut ids = Vec::new();
        for i in 0..20 {
            let order = limit_order(i);
            orders.save(&order).await.unwrap();
            broker
                .publish(&BrokerMessage::for_order(order.order_id().clone()))
                .await
                .unwrap();
            ids.push(order.order_id().clone());
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let mut done = 0;
                for id in &ids {
                    let order = orders.find_by_id(id).await.unwrap().unwrap();
                    if order.status() == OrderStatus::Executed {
                        done += 1;
                    }
                }
                if done == ids.len() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let token = pool.shutdown_token();
        tokio::time::timeout(Duration::from_secs(2), pool.shutdown())
            .await
            .unwrap();
        assert!(token.is_cancelled());
        assert_eq!(broker.in_flight_len(), 0);
    }

    /// Panics on the first execution, then executes normally.
    struct PanicsOnce {
        panicked: AtomicBool,
        inner: SimulatedExecutor,
    }

    #[async_trait]
    impl OrderExecutor for PanicsOnce {
        async fn execute(&self, order: &Order) -> Result<ExecutionReport, ExecutionFailure> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("executor blew up");
            }
            self.inner.execute(order).await
        }
    }

    async fn wait_for_status(
        orders: &InMemoryOrderRepository,
        id: &OrderId,
        status: OrderStatus,
    ) -> Order {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let order = orders.find_by_id(id).await.unwrap().unwrap();
                if order.status() == status {
                    return order;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn panicking_handler_requeues_and_worker_keeps_consuming() {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let broker = Arc::new(InMemoryOrderBroker::new());
        let use_case = Arc::new(ProcessOrderUseCase::new(
            Arc::clone(&orders),
            Arc::clone(&broker),
            Arc::new(PanicsOnce {
                panicked: AtomicBool::new(false),
                inner: SimulatedExecutor::new(),
            }),
            ProcessingSettings::default(),
        ));
        let pool = WorkerPool::start(use_case, 1);

        let first = limit_order(0);
        orders.save(&first).await.unwrap();
        broker
            .publish(&BrokerMessage::for_order(first.order_id().clone()))
            .await
            .unwrap();
        let recovered = wait_for_status(&orders, first.order_id(), OrderStatus::Executed).await;
        assert!(recovered.execution_price().is_some());

        let second = limit_order(1);
        orders.save(&second).await.unwrap();
        broker
            .publish(&BrokerMessage::for_order(second.order_id().clone()))
            .await
            .unwrap();
        wait_for_status(&orders, second.order_id(), OrderStatus::Executed).await;

        assert_eq!(pool.workers(), 1);
        assert_eq!(broker.in_flight_len(), 0);
        assert!(broker.dead_letters().is_empty());
        tokio::time::timeout(Duration::from_secs(2), pool.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs_one_worker() {
        let use_case = Arc::new(ProcessOrderUseCase::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryOrderBroker::new()),
            Arc::new(SimulatedExecutor::new()),
            ProcessingSettings::default(),
        ));
        let pool = WorkerPool::start(use_case, 0);
        assert_eq!(pool.workers(), 1);
        pool.shutdown().await;
    }
}
