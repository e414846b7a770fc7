//! Test transports — in-memory command sources and producers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use accounts_core::transport::{CommandSource, Delivery, MessageProducer, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A command source fed through an mpsc channel. Acknowledged offsets are
/// recorded and can be inspected through the handle returned by
/// `acknowledged`.
#[derive(Debug)]
pub struct ChannelCommandSource {
    rx: mpsc::Receiver<Delivery>,
    acknowledged: Arc<Mutex<Vec<i64>>>,
}

impl ChannelCommandSource {
    /// Creates a source and the sender that feeds it. The source ends once
    /// every sender is dropped.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity);
        let source = Self {
            rx,
            acknowledged: Arc::new(Mutex::new(Vec::new())),
        };
        (source, tx)
    }

    /// Shared view of the offsets acknowledged so far.
    #[must_use]
    pub fn acknowledged(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.acknowledged)
    }

    /// Wraps raw bytes in a `Delivery` on the `commands` topic.
    #[must_use]
    pub fn delivery(offset: i64, payload: Vec<u8>) -> Delivery {
        Delivery {
            topic: "commands".to_owned(),
            partition: 0,
            offset,
            payload,
        }
    }
}

#[async_trait]
impl CommandSource for ChannelCommandSource {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError> {
        self.acknowledged.lock().unwrap().push(delivery.offset);
        Ok(())
    }
}

/// A record captured by `RecordingProducer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Destination topic.
    pub topic: String,
    /// Record key.
    pub key: String,
    /// Record value.
    pub payload: Vec<u8>,
}

/// A producer that records every send and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    sent: Mutex<Vec<SentRecord>>,
}

impl RecordingProducer {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every record sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap().clone()
    }

    /// Polls until at least `count` records were sent or `timeout` elapses,
    /// then returns whatever was recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SentRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl MessageProducer for RecordingProducer {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentRecord {
            topic: topic.to_owned(),
            key: key.to_owned(),
            payload,
        });
        Ok(())
    }
}

/// A producer that rejects every send, either per message or fatally.
#[derive(Debug)]
pub struct FailingProducer {
    fatal: bool,
}

impl FailingProducer {
    /// Every send fails with a recoverable `TransportError::Publish`.
    #[must_use]
    pub fn transient() -> Self {
        Self { fatal: false }
    }

    /// Every send fails with `TransportError::Fatal`.
    #[must_use]
    pub fn fatal() -> Self {
        Self { fatal: true }
    }
}

#[async_trait]
impl MessageProducer for FailingProducer {
    async fn send(&self, topic: &str, _key: &str, _payload: Vec<u8>) -> Result<(), TransportError> {
        if self.fatal {
            Err(TransportError::Fatal("broker connection lost".into()))
        } else {
            Err(TransportError::Publish(format!("topic {topic} unavailable")))
        }
    }
}
