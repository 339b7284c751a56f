//! Order Broker Port (Driven Port)
//!
//! Durable at-least-once work queue feeding the worker pool. Messages carry
//! only the order ID; workers re-read authoritative state from the repository.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{OrderId, Timestamp};

/// Default main queue name.
pub const MAIN_QUEUE: &str = "orders.process";
/// Default dead-letter queue name.
pub const DEAD_LETTER_QUEUE: &str = "orders.process.dead";

/// Wire payload: `{order_id, enqueued_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMessage {
    /// Order to process.
    pub order_id: OrderId,
    /// When the message was first published.
    pub enqueued_at: Timestamp,
}

impl BrokerMessage {
    /// A message for an order, stamped now.
    #[must_use]
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id,
            enqueued_at: Timestamp::now(),
        }
    }

    /// Encode to the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn encode(&self) -> Result<String, BrokerError> {
        serde_json::to_string(self).map_err(|e| BrokerError::Serialization(e.to_string()))
    }

    /// Decode from the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the payload is malformed.
    pub fn decode(payload: &str) -> Result<Self, BrokerError> {
        serde_json::from_str(payload).map_err(|e| BrokerError::Serialization(e.to_string()))
    }
}

/// A message handed to a consumer, pending ack or nack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned handle used to settle the delivery.
    pub tag: u64,
    /// Queue the message came from.
    pub routing_key: String,
    /// Decoded payload.
    pub message: BrokerMessage,
    /// How many times this message was redelivered after a nack.
    pub redelivery_count: u32,
}

/// A message parked on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Original payload.
    pub message: BrokerMessage,
    /// Last failure reason.
    pub reason: String,
    /// Redelivery count when it was dead-lettered.
    pub redelivery_count: u32,
    /// When it was dead-lettered.
    pub dead_lettered_at: Timestamp,
}

/// Broker errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Publisher confirm not received or connection lost.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline.
    #[error("Broker timeout: {0}")]
    Timeout(String),

    /// Payload could not be encoded or decoded.
    #[error("Broker payload error: {0}")]
    Serialization(String),

    /// The delivery tag is not in flight.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),
}

/// Order broker port.
#[async_trait]
pub trait OrderBroker: Send + Sync {
    /// Durably enqueue a message on the main queue.
    ///
    /// Returns only after the broker has accepted the message.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the publish was not confirmed.
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError>;

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the broker has been closed.
    ///
    /// # Errors
    ///
    /// Returns error if the broker fails.
    async fn receive(&self) -> Result<Option<Delivery>, BrokerError>;

    /// Acknowledge a delivery; the message is gone.
    ///
    /// # Errors
    ///
    /// Returns error if the delivery is unknown or the broker fails.
    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Return a delivery to the main queue with its redelivery count bumped.
    ///
    /// # Errors
    ///
    /// Returns error if the delivery is unknown or the broker fails.
    async fn nack_requeue(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError>;

    /// Move a delivery to the dead-letter queue with its failure reason.
    ///
    /// # Errors
    ///
    /// Returns error if the delivery is unknown or the broker fails.
    async fn nack_dead_letter(&self, delivery: &Delivery, reason: &str)
    -> Result<(), BrokerError>;

    /// Liveness check.
    ///
    /// # Errors
    ///
    /// Returns error if the broker is not reachable.
    async fn health_check(&self) -> Result<(), BrokerError>;

    /// Stop handing out deliveries; pending `receive` calls return `None`.
    fn close(&self);
}
