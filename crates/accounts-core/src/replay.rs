//! Event replay source abstraction.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use uuid::Uuid;

use crate::message::Event;

/// Errors raised while requesting or draining a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The replay could not be started.
    #[error("replay request failed: {0}")]
    Request(String),

    /// A single item of the replay could not be read or decoded.
    #[error("replay stream error: {0}")]
    Stream(String),
}

/// A finite sequence of previously committed events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, ReplayError>> + Send>>;

/// Streams events committed since the caller's last catch-up.
#[async_trait]
pub trait EventReplaySource: Send + Sync {
    /// Opens a replay tagged with `correlation_id`. The stream ends when the
    /// source signals end-of-stream or `timeout` elapses.
    async fn replay(
        &self,
        correlation_id: Uuid,
        timeout: Duration,
    ) -> Result<EventStream, ReplayError>;
}
