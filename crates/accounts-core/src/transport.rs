//! Broker transport abstractions.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the broker transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A message could not be received.
    #[error("receive failed: {0}")]
    Receive(String),

    /// A single message could not be published.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The broker connection is unusable.
    #[error("fatal broker error: {0}")]
    Fatal(String),
}

impl TransportError {
    /// Returns `true` if the connection cannot be used any further.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// A raw inbound record claimed from an ordered partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Topic the record was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Record value.
    pub payload: Vec<u8>,
}

/// Ordered source of inbound command records.
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Waits for the next record. `None` once the source is closed.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>>;

    /// Marks `delivery` as consumed so it is not redelivered.
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError>;
}

/// Publishes raw records to a topic.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publishes `payload` to `topic` under `key`.
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}
