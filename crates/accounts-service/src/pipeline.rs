//! The two output lanes: domain events and acknowledgements.
//!
//! Each lane owns a bounded queue and a single consumer task that publishes
//! items in enqueue order. A failed publish is logged and the lane moves on.
//! A lane only ends on shutdown, when every sender is gone, or on a fatal
//! producer error; any of those is reported to the aggregator, and the
//! process is expected to stop once `wait` returns.

use std::sync::Arc;

use accounts_core::message::{Document, Event};
use accounts_core::transport::{MessageProducer, TransportError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::metrics::ServiceMetrics;

const EVENT_LANE: &str = "events";
const ACK_LANE: &str = "acks";

/// Why an output lane stopped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Shutdown was requested or every sender was dropped.
    #[error("{0} lane: session closed")]
    SessionClosed(&'static str),

    /// The producer reported an unrecoverable error.
    #[error("{lane} lane: {source}")]
    Fatal {
        /// Lane name.
        lane: &'static str,
        /// The producer error.
        source: TransportError,
    },

    /// The lane task panicked or was cancelled.
    #[error("lane task failed: {0}")]
    Aborted(String),
}

/// Running output lanes plus the senders that feed them.
#[derive(Debug)]
pub struct OutputPipeline {
    events: mpsc::Sender<Event>,
    results: mpsc::Sender<Document>,
    shutdown: Arc<watch::Sender<bool>>,
    lanes: JoinSet<PipelineError>,
}

impl OutputPipeline {
    /// Spawns both lanes. Events go to `events_topic`; acknowledgements go
    /// to the topic carried by each document. Must be called inside a
    /// Tokio runtime.
    #[must_use]
    pub fn spawn(
        producer: Arc<dyn MessageProducer>,
        events_topic: String,
        capacity: usize,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let shutdown = Arc::new(shutdown);
        let (events, event_rx) = mpsc::channel::<Event>(capacity);
        let (results, result_rx) = mpsc::channel::<Document>(capacity);

        let mut lanes = JoinSet::new();
        lanes.spawn(run_lane(
            EVENT_LANE,
            event_rx,
            shutdown.subscribe(),
            Arc::clone(&producer),
            Arc::clone(&metrics),
            move |event: &Event| Some((events_topic.clone(), event.uuid.to_string())),
            ServiceMetrics::event_published,
        ));
        lanes.spawn(run_lane(
            ACK_LANE,
            result_rx,
            shutdown.subscribe(),
            producer,
            metrics,
            |doc: &Document| {
                (!doc.topic.is_empty()).then(|| (doc.topic.clone(), doc.correlation_id.to_string()))
            },
            ServiceMetrics::ack_published,
        ));

        Self {
            events,
            results,
            shutdown,
            lanes,
        }
    }

    /// A sender feeding the event lane.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.events.clone()
    }

    /// A sender feeding the acknowledgement lane.
    #[must_use]
    pub fn result_sender(&self) -> mpsc::Sender<Document> {
        self.results.clone()
    }

    /// A receiver that observes the shutdown signal.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Signals both lanes to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits until a lane stops, signals shutdown to the other, and returns
    /// the first lane's reason.
    pub async fn wait(&mut self) -> PipelineError {
        let first = match self.lanes.join_next().await {
            Some(Ok(err)) => err,
            Some(Err(join_err)) => PipelineError::Aborted(join_err.to_string()),
            None => PipelineError::SessionClosed("all"),
        };
        self.shutdown();
        while self.lanes.join_next().await.is_some() {}
        first
    }
}

async fn run_lane<T, R>(
    lane: &'static str,
    mut rx: mpsc::Receiver<T>,
    mut shutdown: watch::Receiver<bool>,
    producer: Arc<dyn MessageProducer>,
    metrics: Arc<ServiceMetrics>,
    route: R,
    published: fn(&ServiceMetrics),
) -> PipelineError
where
    T: Serialize + Send + 'static,
    R: Fn(&T) -> Option<(String, String)> + Send + 'static,
{
    info!(lane, "output lane started");
    loop {
        let item = tokio::select! {
            _ = shutdown.changed() => None,
            item = rx.recv() => item,
        };
        let Some(item) = item else {
            info!(lane, "output lane stopping");
            return PipelineError::SessionClosed(lane);
        };

        let Some((topic, key)) = route(&item) else {
            warn!(lane, "dropping message without a destination topic");
            metrics.publish_failed();
            continue;
        };
        let payload = match serde_json::to_vec(&item) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(lane, %topic, error = %e, "failed to encode message");
                metrics.publish_failed();
                continue;
            }
        };

        match producer.send(&topic, &key, payload).await {
            Ok(()) => published(&metrics),
            Err(e) if e.is_fatal() => {
                error!(lane, %topic, error = %e, "fatal producer error");
                metrics.publish_failed();
                return PipelineError::Fatal { lane, source: e };
            }
            Err(e) => {
                warn!(lane, %topic, error = %e, "publish failed");
                metrics.publish_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use accounts_core::message::{Command, Document, Event};
    use accounts_test_support::{FailingProducer, FixedClock, RecordingProducer};
    use uuid::Uuid;

    use super::*;

    fn event() -> Event {
        Event::new(
            "UserDeleted",
            Uuid::new_v4(),
            b"{}".to_vec(),
            "agg-user-cmd",
            FixedClock::reference().0,
        )
    }

    fn ack(topic: &str) -> Document {
        let command = Command {
            response_topic: topic.to_owned(),
            uuid: Uuid::new_v4(),
            ..Command::default()
        };
        Document::success(&command, "agg-user-cmd", b"{}".to_vec())
    }

    #[tokio::test]
    async fn test_lanes_publish_to_their_topics_in_order() {
        // Arrange
        let producer = Arc::new(RecordingProducer::new());
        let metrics = Arc::new(ServiceMetrics::default());
        let pipeline =
            OutputPipeline::spawn(producer.clone(), "events".to_owned(), 4, Arc::clone(&metrics));
        let first = event();
        let second = event();
        let doc = ack("user.response");

        // Act
        pipeline.event_sender().send(first.clone()).await.unwrap();
        pipeline.event_sender().send(second.clone()).await.unwrap();
        pipeline.result_sender().send(doc.clone()).await.unwrap();
        let sent = producer.wait_for(3, Duration::from_secs(2)).await;

        // Assert
        let events: Vec<_> = sent.iter().filter(|r| r.topic == "events").collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, first.uuid.to_string());
        assert_eq!(events[1].key, second.uuid.to_string());
        let acks: Vec<_> = sent.iter().filter(|r| r.topic == "user.response").collect();
        let decoded: Document = serde_json::from_slice(&acks[0].payload).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(metrics.snapshot().events_published, 2);
        assert_eq!(metrics.snapshot().acks_published, 1);
    }

    #[tokio::test]
    async fn test_ack_without_topic_is_skipped() {
        let producer = Arc::new(RecordingProducer::new());
        let metrics = Arc::new(ServiceMetrics::default());
        let pipeline =
            OutputPipeline::spawn(producer.clone(), "events".to_owned(), 4, Arc::clone(&metrics));

        pipeline.result_sender().send(ack("")).await.unwrap();
        pipeline.result_sender().send(ack("user.response")).await.unwrap();
        let sent = producer.wait_for(1, Duration::from_secs(2)).await;

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "user.response");
        assert_eq!(metrics.snapshot().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_shutdown_ends_both_lanes_with_session_closed() {
        let mut pipeline = OutputPipeline::spawn(
            Arc::new(RecordingProducer::new()),
            "events".to_owned(),
            4,
            Arc::new(ServiceMetrics::default()),
        );

        pipeline.shutdown();
        let reason = tokio::time::timeout(Duration::from_secs(2), pipeline.wait())
            .await
            .unwrap();

        assert!(matches!(reason, PipelineError::SessionClosed(_)));
        assert!(reason.to_string().ends_with("session closed"));
    }

    #[tokio::test]
    async fn test_transient_publish_errors_keep_lane_running() {
        let metrics = Arc::new(ServiceMetrics::default());
        let mut pipeline = OutputPipeline::spawn(
            Arc::new(FailingProducer::transient()),
            "events".to_owned(),
            4,
            Arc::clone(&metrics),
        );

        pipeline.event_sender().send(event()).await.unwrap();
        pipeline.event_sender().send(event()).await.unwrap();
        let stopped = tokio::time::timeout(Duration::from_millis(200), pipeline.wait()).await;

        assert!(stopped.is_err(), "lane should still be running");
        assert_eq!(metrics.snapshot().publish_failures, 2);
    }

    #[tokio::test]
    async fn test_fatal_publish_error_ends_the_lane() {
        let mut pipeline = OutputPipeline::spawn(
            Arc::new(FailingProducer::fatal()),
            "events".to_owned(),
            4,
            Arc::new(ServiceMetrics::default()),
        );

        pipeline.event_sender().send(event()).await.unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(2), pipeline.wait())
            .await
            .unwrap();

        assert!(matches!(
            reason,
            PipelineError::Fatal {
                lane: "events",
                source: TransportError::Fatal(_)
            }
        ));
    }
}
