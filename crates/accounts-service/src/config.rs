//! Service configuration loaded from environment variables.
//!
//! The binary loads a `.env` file before reading them; variables already
//! set in the environment take precedence. Numeric settings that fail to
//! parse fall back to their default with a warning.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use accounts_core::account::AGGREGATE_ID;
use tracing::warn;

use crate::error::ConfigError;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DATABASE_TIMEOUT_MS: u64 = 3000;
const DEFAULT_REBUILD_TIMEOUT_SEC: u64 = 5;
const DEFAULT_COMMAND_CONCURRENCY: usize = 64;
const DEFAULT_OUTPUT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_BCRYPT_COST: u32 = 10;
const DEFAULT_PORT: u16 = 3000;

/// Broker topics, groups and the replay end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Consumer group for commands.
    pub request_group: String,
    /// Topic commands arrive on.
    pub request_topic: String,
    /// Consumer group for replay responses.
    pub replay_response_group: String,
    /// Topic replay responses arrive on, already suffixed with the
    /// aggregate ID.
    pub replay_response_topic: String,
    /// Topic replay requests are published to.
    pub replay_request_topic: String,
    /// Topic domain events are published to.
    pub events_topic: String,
    /// Payload marking the end of a replay.
    pub end_of_stream_token: String,
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Written to the `source` field of events and acknowledgements.
    pub service_name: String,
    /// `PostgreSQL` connection string for the projection.
    pub database_url: String,
    /// Projection pool size.
    pub database_max_connections: u32,
    /// How long to wait for a pooled connection.
    pub database_timeout: Duration,
    /// Broker settings.
    pub kafka: KafkaSettings,
    /// Upper bound on one projection rebuild.
    pub rebuild_timeout: Duration,
    /// Commands processed concurrently.
    pub command_concurrency: usize,
    /// Capacity of each output lane.
    pub output_queue_capacity: usize,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
    /// Health endpoint host.
    pub host: String,
    /// Health endpoint port.
    pub port: u16,
}

impl ServiceConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for the first required variable that
    /// is unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for the first required variable that
    /// is unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let service_name = required("SERVICE_NAME")?;
        let database_url = required("DATABASE_URL")?;
        let kafka = KafkaSettings {
            brokers: required("KAFKA_BROKERS")?,
            request_group: required("KAFKA_CONSUMER_GROUP_REQUEST")?,
            request_topic: required("KAFKA_CONSUMER_TOPIC_REQUEST")?,
            replay_response_group: required("KAFKA_CONSUMER_GROUP_ESRESP")?,
            replay_response_topic: format!(
                "{}.{AGGREGATE_ID}",
                required("KAFKA_CONSUMER_TOPIC_ESRESP")?
            ),
            replay_request_topic: required("KAFKA_PRODUCER_TOPIC_ESREQ")?,
            events_topic: required("KAFKA_PRODUCER_TOPIC_EVENTS")?,
            end_of_stream_token: required("KAFKA_END_OF_STREAM_TOKEN")?,
        };

        Ok(Self {
            service_name,
            database_url,
            database_max_connections: numeric(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
                |v| *v > 0,
            ),
            database_timeout: Duration::from_millis(numeric(
                &lookup,
                "DATABASE_TIMEOUT_MS",
                DEFAULT_DATABASE_TIMEOUT_MS,
                |v| *v > 0,
            )),
            kafka,
            rebuild_timeout: Duration::from_secs(numeric(
                &lookup,
                "AGG_BUILDER_TIMEOUT_SEC",
                DEFAULT_REBUILD_TIMEOUT_SEC,
                |v| *v > 0,
            )),
            command_concurrency: numeric(
                &lookup,
                "COMMAND_CONCURRENCY",
                DEFAULT_COMMAND_CONCURRENCY,
                |v| *v > 0,
            ),
            output_queue_capacity: numeric(
                &lookup,
                "OUTPUT_QUEUE_CAPACITY",
                DEFAULT_OUTPUT_QUEUE_CAPACITY,
                |v| *v > 0,
            ),
            bcrypt_cost: numeric(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST, |v| {
                (4..=31).contains(v)
            }),
            host: lookup("HOST")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: numeric(&lookup, "PORT", DEFAULT_PORT, |_| true),
        })
    }

    /// The health endpoint's listen address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidAddress` if `HOST:PORT` does not parse.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

fn numeric<F, T>(lookup: &F, name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(variable = name, value = %raw, %default, "invalid setting, using default");
            default
        }
    }
}
