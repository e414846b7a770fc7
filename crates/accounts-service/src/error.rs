//! Service startup and runtime error types.

use accounts_core::store::StoreError;
use accounts_core::transport::TransportError;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// A required setting is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The environment variable is unset or blank.
    #[error("environment variable {0} is required but not set")]
    Missing(&'static str),

    /// `HOST`/`PORT` do not form a socket address.
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

/// Startup and runtime errors for the service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The projection schema could not be created.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A broker client could not be created.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tracing or exporter setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// An output lane ended; the process must stop.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
