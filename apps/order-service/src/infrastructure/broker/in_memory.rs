//! In-memory order broker.
//!
//! Messages are held as their JSON wire payload so that the encode/decode
//! path matches the durable broker. Poison payloads are parked on the
//! dead-letter queue instead of being handed to consumers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::application::ports::{
    BrokerError, BrokerMessage, DEAD_LETTER_QUEUE, DeadLetter, Delivery, MAIN_QUEUE, OrderBroker,
};
use crate::domain::shared::{OrderId, Timestamp};
use crate::error::ErrorCode;

#[derive(Debug, Clone)]
struct Envelope {
    payload: String,
    redelivery_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Envelope>,
    in_flight: HashMap<u64, Envelope>,
    dead: Vec<DeadLetter>,
    next_tag: u64,
    published: u64,
}

/// Process-local `OrderBroker`.
#[derive(Debug)]
pub struct InMemoryOrderBroker {
    main_queue: String,
    dead_letter_queue: String,
    state: Mutex<QueueState>,
    notify: Notify,
    closed: AtomicBool,
}

impl Default for InMemoryOrderBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderBroker {
    /// Create a broker with the default queue names.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queues(MAIN_QUEUE, DEAD_LETTER_QUEUE)
    }

    /// Create a broker with custom queue names.
    #[must_use]
    pub fn with_queues(main_queue: impl Into<String>, dead_letter_queue: impl Into<String>) -> Self {
        Self {
            main_queue: main_queue.into(),
            dead_letter_queue: dead_letter_queue.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a raw payload on the main queue, bypassing encoding.
    pub fn publish_raw(&self, payload: impl Into<String>) {
        let mut state = self.state.lock();
        state.ready.push_back(Envelope {
            payload: payload.into(),
            redelivery_count: 0,
        });
        state.published += 1;
        drop(state);
        self.notify.notify_one();
    }

    /// Messages currently parked on the dead-letter queue.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead.clone()
    }

    /// Messages waiting on the main queue.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Messages delivered but not yet settled.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Total messages accepted by `publish` since creation.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.state.lock().published
    }

    /// Dead-letter queue name.
    #[must_use]
    pub fn dead_letter_queue(&self) -> &str {
        &self.dead_letter_queue
    }

    /// Take the next decodable message, parking poison payloads.
    fn try_take(&self) -> Option<Delivery> {
        let mut state = self.state.lock();
        while let Some(envelope) = state.ready.pop_front() {
            match BrokerMessage::decode(&envelope.payload) {
                Ok(message) => {
                    state.next_tag += 1;
                    let tag = state.next_tag;
                    let redelivery_count = envelope.redelivery_count;
                    state.in_flight.insert(tag, envelope);
                    return Some(Delivery {
                        tag,
                        routing_key: self.main_queue.clone(),
                        message,
                        redelivery_count,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Dead-lettering undecodable payload");
                    state.dead.push(DeadLetter {
                        message: BrokerMessage {
                            order_id: OrderId::new(""),
                            enqueued_at: Timestamp::now(),
                        },
                        reason: format!("{}: {e}", ErrorCode::PoisonMessage.reason()),
                        redelivery_count: envelope.redelivery_count,
                        dead_lettered_at: Timestamp::now(),
                    });
                }
            }
        }
        None
    }

    fn settle(&self, delivery: &Delivery) -> Result<Envelope, BrokerError> {
        self.state
            .lock()
            .in_flight
            .remove(&delivery.tag)
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))
    }
}

#[async_trait]
impl OrderBroker for InMemoryOrderBroker {
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Unavailable("broker is closed".to_string()));
        }
        self.publish_raw(message.encode()?);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            if let Some(delivery) = self.try_take() {
                return Ok(Some(delivery));
            }
            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.settle(delivery).map(|_| ())
    }

    async fn nack_requeue(&self, delivery: &Delivery, _reason: &str) -> Result<(), BrokerError> {
        let mut envelope = self.settle(delivery)?;
        envelope.redelivery_count = envelope.redelivery_count.saturating_add(1);
        self.state.lock().ready.push_back(envelope);
        self.notify.notify_one();
        Ok(())
    }

    async fn nack_dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        let envelope = self.settle(delivery)?;
        self.state.lock().dead.push(DeadLetter {
            message: delivery.message.clone(),
            reason: reason.to_string(),
            redelivery_count: envelope.redelivery_count,
            dead_lettered_at: Timestamp::now(),
        });
        Ok(())
    }

    async fn health_check(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrokerError::Unavailable("broker is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn message(id: &str) -> BrokerMessage {
        BrokerMessage::for_order(OrderId::new(id))
    }

    #[tokio::test]
    async fn publish_then_receive_fifo() {
        let broker = InMemoryOrderBroker::new();
        broker.publish(&message("a")).await.unwrap();
        broker.publish(&message("b")).await.unwrap();

        let first = broker.receive().await.unwrap().unwrap();
        let second = broker.receive().await.unwrap().unwrap();
        assert_eq!(first.message.order_id.as_str(), "a");
        assert_eq!(second.message.order_id.as_str(), "b");
        assert_eq!(first.routing_key, MAIN_QUEUE);
        assert_eq!(broker.in_flight_len(), 2);
        assert_eq!(broker.published_count(), 2);
    }

    #[tokio::test]
    async fn requeue_bumps_redelivery_count() {
        let broker = InMemoryOrderBroker::new();
        broker.publish(&message("a")).await.unwrap();

        for expected in 0..3 {
            let delivery = broker.receive().await.unwrap().unwrap();
            assert_eq!(delivery.redelivery_count, expected);
            broker.nack_requeue(&delivery, "MARKET_DATA_TIMEOUT").await.unwrap();
        }
    }

    #[tokio::test]
    async fn dead_letter_keeps_reason_and_count() {
        let broker = InMemoryOrderBroker::new();
        broker.publish(&message("a")).await.unwrap();
        let delivery = broker.receive().await.unwrap().unwrap();
        broker.nack_requeue(&delivery, "x").await.unwrap();
        let delivery = broker.receive().await.unwrap().unwrap();
        broker
            .nack_dead_letter(&delivery, "PROCESSING_FAILED")
            .await
            .unwrap();

        let dead = broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "PROCESSING_FAILED");
        assert_eq!(dead[0].redelivery_count, 1);
        assert_eq!(broker.ready_len(), 0);
        assert_eq!(broker.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn double_settle_is_unknown_delivery() {
        let broker = InMemoryOrderBroker::new();
        broker.publish(&message("a")).await.unwrap();
        let delivery = broker.receive().await.unwrap().unwrap();
        broker.ack(&delivery).await.unwrap();
        assert_eq!(
            broker.ack(&delivery).await,
            Err(BrokerError::UnknownDelivery(delivery.tag))
        );
    }

    #[tokio::test]
    async fn poison_payload_goes_to_dead_letters() {
        let broker = InMemoryOrderBroker::new();
        broker.publish_raw("{not json");
        broker.publish(&message("a")).await.unwrap();

        let delivery = broker.receive().await.unwrap().unwrap();
        assert_eq!(delivery.message.order_id.as_str(), "a");
        let dead = broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].reason.starts_with("POISON_MESSAGE"));
    }

    #[tokio::test]
    async fn receive_wakes_on_publish() {
        let broker = Arc::new(InMemoryOrderBroker::new());
        let consumer = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.receive().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish(&message("late")).await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.message.order_id.as_str(), "late");
    }

    #[tokio::test]
    async fn close_releases_waiting_consumers() {
        let broker = Arc::new(InMemoryOrderBroker::new());
        let consumer = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.receive().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.close();

        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Ok(None));
        assert!(broker.health_check().await.is_err());
        assert!(broker.publish(&message("x")).await.is_err());
    }
}
