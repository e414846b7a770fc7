//! Test replay sources — scripted `EventReplaySource` implementations.

use std::sync::Mutex;
use std::time::Duration;

use accounts_core::message::Event;
use accounts_core::replay::{EventReplaySource, EventStream, ReplayError};
use async_trait::async_trait;
use uuid::Uuid;

/// Replays a fixed batch of events once, then returns empty replays, the
/// way a checkpointed source only yields what the caller has not seen yet.
/// Records the correlation ID and timeout of every request.
#[derive(Debug, Default)]
pub struct ScriptedReplaySource {
    pending: Mutex<Vec<Result<Event, ReplayError>>>,
    requests: Mutex<Vec<(Uuid, Duration)>>,
}

impl ScriptedReplaySource {
    /// Creates a source that yields `items` on its first replay.
    #[must_use]
    pub fn new(items: Vec<Result<Event, ReplayError>>) -> Self {
        Self {
            pending: Mutex::new(items),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a source that never has anything to replay.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queues more items for the next replay.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push(&self, event: Event) {
        self.pending.lock().unwrap().push(Ok(event));
    }

    /// Returns every `(correlation_id, timeout)` passed to `replay`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<(Uuid, Duration)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventReplaySource for ScriptedReplaySource {
    async fn replay(
        &self,
        correlation_id: Uuid,
        timeout: Duration,
    ) -> Result<EventStream, ReplayError> {
        self.requests.lock().unwrap().push((correlation_id, timeout));
        let items = std::mem::take(&mut *self.pending.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// A replay source that cannot be opened.
#[derive(Debug)]
pub struct FailingReplaySource;

#[async_trait]
impl EventReplaySource for FailingReplaySource {
    async fn replay(
        &self,
        _correlation_id: Uuid,
        _timeout: Duration,
    ) -> Result<EventStream, ReplayError> {
        Err(ReplayError::Request("event store unreachable".into()))
    }
}

/// A replay source that yields its events and then never signals
/// end-of-stream, so only the caller's deadline ends the replay.
#[derive(Debug, Default)]
pub struct PendingReplaySource {
    events: Vec<Event>,
}

impl PendingReplaySource {
    /// Creates a source that yields `events` and then hangs.
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventReplaySource for PendingReplaySource {
    async fn replay(
        &self,
        _correlation_id: Uuid,
        _timeout: Duration,
    ) -> Result<EventStream, ReplayError> {
        use futures::StreamExt as _;

        let head = futures::stream::iter(
            self.events
                .clone()
                .into_iter()
                .map(Ok::<Event, ReplayError>),
        );
        Ok(Box::pin(head.chain(futures::stream::pending())))
    }
}
