//! rdkafka-backed consumer and producer.
//!
//! Consumers run with auto-commit on but auto offset store off: an offset
//! is only committed after `acknowledge` stores it, which the intake loop
//! does as soon as a record is received.

use std::time::Duration;

use accounts_core::transport::{CommandSource, Delivery, MessageProducer, TransportError};
use async_trait::async_trait;
use rdkafka::Message as _;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

fn classify(error: &KafkaError, otherwise: fn(String) -> TransportError) -> TransportError {
    if error.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal) {
        TransportError::Fatal(error.to_string())
    } else {
        otherwise(error.to_string())
    }
}

/// The committed offset is the next one the group reads, not the last one
/// it consumed.
fn resume_offset(delivery: &Delivery) -> i64 {
    delivery.offset + 1
}

/// A consumer-group member reading one topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl std::fmt::Debug for KafkaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSource")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl KafkaSource {
    /// Joins `group` on `brokers` and subscribes to `topic`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Fatal` if the consumer cannot be created or
    /// subscribed.
    pub fn connect(brokers: &str, group: &str, topic: &str) -> Result<Self, TransportError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| TransportError::Fatal(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| TransportError::Fatal(e.to_string()))?;

        info!(topic, group, "kafka consumer subscribed");
        Ok(Self {
            consumer,
            topic: topic.to_owned(),
        })
    }
}

#[async_trait]
impl CommandSource for KafkaSource {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let delivery = match self.consumer.recv().await {
            Ok(message) => Ok(Delivery {
                topic: message.topic().to_owned(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            }),
            Err(e) => Err(classify(&e, TransportError::Receive)),
        };
        Some(delivery)
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError> {
        self.consumer
            .store_offset(&delivery.topic, delivery.partition, resume_offset(delivery))
            .map_err(|e| classify(&e, TransportError::Receive))
    }
}

/// A shared producer for every outbound topic.
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl std::fmt::Debug for KafkaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer").finish_non_exhaustive()
    }
}

impl KafkaProducer {
    /// Creates a producer for `brokers`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Fatal` if the producer cannot be created.
    pub fn connect(brokers: &str) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| TransportError::Fatal(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);
        debug!(topic, key, "publishing record");
        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(e, _)| classify(&e, TransportError::Publish))
    }
}
