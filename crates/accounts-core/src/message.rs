//! Wire envelopes exchanged with the message broker.
//!
//! All three envelopes are JSON documents. Byte payloads travel as base64
//! strings, and a `null` payload decodes to an empty one.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AGGREGATE_ID;
use crate::error::DomainError;

/// An inbound request to mutate an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    /// Action name used to route the command to an executor.
    pub action: String,
    /// Correlation ID assigned by the issuer.
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    /// Action-specific payload.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Topic the acknowledgement is published to.
    #[serde(rename = "responseTopic")]
    pub response_topic: String,
    /// Identifier of the issuing service.
    pub source: String,
    /// Topic the command was originally published to.
    #[serde(rename = "sourceTopic")]
    pub source_topic: String,
    /// Emission time, unix seconds.
    pub timestamp: i64,
    /// Seconds after `timestamp` during which the command may be acted on.
    #[serde(rename = "ttlSec")]
    pub ttl_sec: i32,
    /// Unique message identifier.
    pub uuid: Uuid,
}

impl Command {
    /// The instant after which the command must be ignored, or `None` if the
    /// timestamp is out of range.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|emitted| emitted + Duration::seconds(i64::from(self.ttl_sec)))
    }

    /// Returns `true` once `now` is past `timestamp + ttl_sec`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expiry| expiry < now)
    }
}

/// The committed outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event action, e.g. `RegisterUser`.
    pub action: String,
    /// Aggregate type tag.
    #[serde(rename = "aggregateID")]
    pub aggregate_id: i8,
    /// Unique ID of the command that produced this event.
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    /// Action-specific payload.
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
    /// Creation time in nanoseconds since the unix epoch.
    #[serde(rename = "nanoTime")]
    pub nano_time: i64,
    /// Name of the emitting service.
    pub source: String,
    /// Unique event identifier.
    pub uuid: Uuid,
    /// Partition bucket (calendar year of creation).
    #[serde(rename = "yearBucket")]
    pub year_bucket: i32,
}

impl Event {
    /// Builds an account event stamped at `now`.
    #[must_use]
    pub fn new(
        action: &str,
        correlation_id: Uuid,
        data: Vec<u8>,
        source: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            action: action.to_owned(),
            aggregate_id: AGGREGATE_ID,
            correlation_id,
            data,
            nano_time: now.timestamp_nanos_opt().unwrap_or_default(),
            source: source.to_owned(),
            uuid: Uuid::new_v4(),
            year_bucket: now.year(),
        }
    }
}

/// Acknowledgement returned to the command issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Unique message ID of the originating command.
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    /// Result payload on success, empty on failure.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Error message on failure, empty on success.
    pub error: String,
    /// Error code on failure, zero on success.
    #[serde(rename = "errorCode")]
    pub error_code: i16,
    /// Name of the emitting service.
    pub source: String,
    /// Destination topic (the command's response topic).
    pub topic: String,
    /// Unique document identifier.
    pub uuid: Uuid,
}

impl Document {
    /// Acknowledges `command` with a result payload.
    #[must_use]
    pub fn success(command: &Command, source: &str, data: Vec<u8>) -> Self {
        Self {
            correlation_id: command.uuid,
            data,
            error: String::new(),
            error_code: 0,
            source: source.to_owned(),
            topic: command.response_topic.clone(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Acknowledges `command` with an error.
    #[must_use]
    pub fn failure(command: &Command, source: &str, error: &DomainError) -> Self {
        Self {
            correlation_id: command.uuid,
            data: Vec::new(),
            error: error.to_string(),
            error_code: error.code(),
            source: source.to_owned(),
            topic: command.response_topic.clone(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Returns `true` if this document reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }
}

/// Serde adapter encoding bytes as a standard base64 string.
pub mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Encodes `bytes` as base64.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Decodes a base64 string; `null` yields an empty buffer.
    ///
    /// # Errors
    ///
    /// Fails if the input is not valid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            None => Ok(Vec::new()),
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
        }
    }
}
