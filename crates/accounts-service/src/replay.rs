//! Event replay over the message broker.
//!
//! A replay is a request/response exchange: a query is published to the
//! replay request topic, and the event store answers on the response topic
//! with one document per outstanding event followed by a document whose
//! payload is the end-of-stream token. Responses for every replay in flight
//! share one consumer, so they are routed back to the waiting stream by
//! correlation ID.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use accounts_core::account::AGGREGATE_ID;
use accounts_core::clock::Clock;
use accounts_core::message::{Document, Event};
use accounts_core::replay::{EventReplaySource, EventStream, ReplayError};
use accounts_core::transport::{CommandSource, MessageProducer, TransportError};
use async_trait::async_trait;
use chrono::Datelike;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

const ROUTE_CAPACITY: usize = 64;

/// Where responses for one replay go. Responses that arrive while the
/// queue is full are dropped and surface as stream errors instead.
#[derive(Clone)]
struct Route {
    items: mpsc::Sender<Result<Event, ReplayError>>,
    overflowed: Arc<AtomicU64>,
}

type Routes = Arc<Mutex<HashMap<Uuid, Route>>>;

fn take_overflow(overflowed: &AtomicU64) -> bool {
    overflowed
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

fn overflow_error() -> ReplayError {
    ReplayError::Stream("replay response dropped: queue full".into())
}

/// Query published to request a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayQuery {
    /// Aggregate whose events are requested.
    #[serde(rename = "aggregateID")]
    pub aggregate_id: i8,
    /// Echoed back on every response document.
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    /// How long the requester will wait.
    #[serde(rename = "timeoutSec")]
    pub timeout_sec: u64,
    /// Unique query identifier.
    pub uuid: Uuid,
    /// Partition bucket to read from.
    #[serde(rename = "yearBucket")]
    pub year_bucket: i32,
}

/// `EventReplaySource` that talks to the event store through the broker.
pub struct BrokerReplaySource {
    producer: Arc<dyn MessageProducer>,
    clock: Arc<dyn Clock>,
    request_topic: String,
    end_of_stream: Vec<u8>,
    routes: Routes,
}

impl std::fmt::Debug for BrokerReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerReplaySource")
            .field("request_topic", &self.request_topic)
            .finish_non_exhaustive()
    }
}

/// Removes a replay's route once its stream is dropped.
struct RouteGuard {
    correlation_id: Uuid,
    routes: Routes,
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.correlation_id);
    }
}

impl BrokerReplaySource {
    /// Creates a source publishing queries to `request_topic`.
    #[must_use]
    pub fn new(
        producer: Arc<dyn MessageProducer>,
        clock: Arc<dyn Clock>,
        request_topic: String,
        end_of_stream_token: &str,
    ) -> Self {
        Self {
            producer,
            clock,
            request_topic,
            end_of_stream: end_of_stream_token.as_bytes().to_vec(),
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of replays currently waiting for responses.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Routes one response document to the replay waiting for it.
    /// Responses for unknown or finished replays are ignored. Never waits,
    /// so one slow replay cannot hold up the others.
    pub fn route_response(&self, payload: &[u8]) {
        let document: Document = match serde_json::from_slice(payload) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "dropping undecodable replay response");
                return;
            }
        };

        let correlation_id = document.correlation_id;
        let route = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            if document.data == self.end_of_stream {
                // Dropping the sender ends the waiting stream.
                routes.remove(&correlation_id);
                return;
            }
            routes.get(&correlation_id).cloned()
        };
        let Some(route) = route else {
            debug!(%correlation_id, "replay response without a waiting replay");
            return;
        };

        let item = if document.is_error() {
            Err(ReplayError::Stream(document.error))
        } else {
            serde_json::from_slice::<Event>(&document.data)
                .map_err(|e| ReplayError::Stream(format!("undecodable event: {e}")))
        };
        match route.items.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%correlation_id, "replay queue full, dropping response");
                route.overflowed.fetch_add(1, Ordering::AcqRel);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%correlation_id, "replay abandoned before completion");
            }
        }
    }

    /// Feeds every response from `source` to `route_response` until the
    /// source ends or `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns the fatal `TransportError` that ended the loop.
    pub async fn run_responses<S: CommandSource>(
        &self,
        mut source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        info!("listening for replay responses");
        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = source.next_delivery() => next,
            };
            match next {
                None => break,
                Some(Ok(delivery)) => {
                    if let Err(e) = source.acknowledge(&delivery).await {
                        warn!(error = %e, "failed to acknowledge replay response");
                    }
                    self.route_response(&delivery.payload);
                }
                Some(Err(e)) if e.is_fatal() => return Err(e),
                Some(Err(e)) => warn!(error = %e, "failed to receive replay response"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventReplaySource for BrokerReplaySource {
    async fn replay(
        &self,
        correlation_id: Uuid,
        timeout: Duration,
    ) -> Result<EventStream, ReplayError> {
        let (tx, rx) = mpsc::channel(ROUTE_CAPACITY);
        let overflowed = Arc::new(AtomicU64::new(0));
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                correlation_id,
                Route {
                    items: tx,
                    overflowed: Arc::clone(&overflowed),
                },
            );
        let guard = RouteGuard {
            correlation_id,
            routes: Arc::clone(&self.routes),
        };

        let query = ReplayQuery {
            aggregate_id: AGGREGATE_ID,
            correlation_id,
            timeout_sec: timeout.as_secs(),
            uuid: Uuid::new_v4(),
            year_bucket: self.clock.now().year(),
        };
        let payload =
            serde_json::to_vec(&query).map_err(|e| ReplayError::Request(e.to_string()))?;
        self.producer
            .send(&self.request_topic, &correlation_id.to_string(), payload)
            .await
            .map_err(|e| ReplayError::Request(e.to_string()))?;

        let stream = futures::stream::unfold(
            (rx, overflowed, guard),
            |(mut rx, overflowed, guard)| async move {
                if take_overflow(&overflowed) {
                    return Some((Err(overflow_error()), (rx, overflowed, guard)));
                }
                let item = match rx.recv().await {
                    Some(item) => item,
                    None if take_overflow(&overflowed) => Err(overflow_error()),
                    None => return None,
                };
                Some((item, (rx, overflowed, guard)))
            },
        );
        Ok(Box::pin(stream))
    }
}
