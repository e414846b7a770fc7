//! Kafka implementations of the transport traits.

mod kafka;

pub use kafka::{KafkaProducer, KafkaSource};
