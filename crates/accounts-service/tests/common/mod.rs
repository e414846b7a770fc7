//! Shared helpers for service integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use accounts_command::application::command_handlers::CommandContext;
use accounts_command::application::dispatcher::CommandDispatcher;
use accounts_command::application::projection_rebuilder::{ProjectionRebuilder, RebuildMetrics};
use accounts_command::domain::password::BcryptHasher;
use accounts_core::message::Command;
use accounts_core::transport::{Delivery, TransportError};
use accounts_service::intake::{CommandWorker, IntakeLoop};
use accounts_service::metrics::{ServiceMetrics, ServiceSnapshot};
use accounts_service::pipeline::OutputPipeline;
use accounts_service::routes;
use accounts_service::state::AppState;
use accounts_test_support::{
    ChannelCommandSource, FixedClock, InMemoryProjectionStore, RecordingProducer,
    ScriptedReplaySource,
};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

pub const EVENTS_TOPIC: &str = "account.events";
pub const RESPONSE_TOPIC: &str = "user.response";
pub const SERVICE_NAME: &str = "agg-user-cmd";

/// The service wired against in-memory doubles, the same way `main.rs`
/// wires it against Postgres and Kafka.
pub struct TestService {
    pub clock: FixedClock,
    pub store: Arc<InMemoryProjectionStore>,
    pub replay: Arc<ScriptedReplaySource>,
    pub producer: Arc<RecordingProducer>,
    pub metrics: Arc<ServiceMetrics>,
    pub rebuild: Arc<RebuildMetrics>,
    pub pipeline: OutputPipeline,
    pub intake: Arc<IntakeLoop>,
}

/// A running intake loop and the handles needed to drive it.
pub struct RunningIntake {
    pub deliveries: mpsc::Sender<Delivery>,
    pub acknowledged: Arc<Mutex<Vec<i64>>>,
    pub task: JoinHandle<Result<(), TransportError>>,
}

pub fn build_service() -> TestService {
    let clock = FixedClock::reference();
    let store = Arc::new(InMemoryProjectionStore::new());
    let replay = Arc::new(ScriptedReplaySource::empty());
    let producer = Arc::new(RecordingProducer::new());
    let metrics = Arc::new(ServiceMetrics::default());
    let rebuild = Arc::new(RebuildMetrics::default());

    let pipeline = OutputPipeline::spawn(
        producer.clone(),
        EVENTS_TOPIC.to_owned(),
        16,
        Arc::clone(&metrics),
    );
    let context = CommandContext {
        store: store.clone(),
        hasher: Arc::new(BcryptHasher::new(4)),
        clock: Arc::new(clock),
        service_name: SERVICE_NAME.to_owned(),
    };
    let rebuilder = ProjectionRebuilder::new(store.clone(), replay.clone(), Arc::clone(&rebuild));
    let dispatcher = Arc::new(CommandDispatcher::new(
        context,
        rebuilder,
        Duration::from_secs(1),
        pipeline.event_sender(),
        pipeline.result_sender(),
    ));
    let worker = CommandWorker::new(dispatcher, Arc::new(clock), Arc::clone(&metrics));
    let intake = Arc::new(IntakeLoop::new(worker, 4));

    TestService {
        clock,
        store,
        replay,
        producer,
        metrics,
        rebuild,
        pipeline,
        intake,
    }
}

impl TestService {
    /// The HTTP router, built the same way as in `main.rs`.
    pub fn router(&self) -> Router {
        routes::router(AppState::new(
            Arc::clone(&self.metrics),
            Arc::clone(&self.rebuild),
        ))
    }

    /// Starts the intake loop on a channel-fed source.
    pub fn start(&self) -> RunningIntake {
        let (source, deliveries) = ChannelCommandSource::new(16);
        let acknowledged = source.acknowledged();
        let intake = Arc::clone(&self.intake);
        let shutdown = self.pipeline.shutdown_signal();
        let task = tokio::spawn(async move { intake.run(source, shutdown).await });
        RunningIntake {
            deliveries,
            acknowledged,
            task,
        }
    }

    /// A command envelope stamped at the fixed clock's current time.
    pub fn command(&self, action: &str, data: &serde_json::Value) -> Command {
        Command {
            action: action.to_owned(),
            correlation_id: Uuid::new_v4(),
            data: serde_json::to_vec(data).unwrap(),
            response_topic: RESPONSE_TOPIC.to_owned(),
            source: "user-api".to_owned(),
            source_topic: "user.commands".to_owned(),
            timestamp: self.clock.unix_seconds(),
            ttl_sec: 30,
            uuid: Uuid::new_v4(),
        }
    }

    /// Polls the service counters until `done` holds or `timeout` elapses.
    pub async fn wait_until<F>(&self, timeout: Duration, done: F) -> ServiceSnapshot
    where
        F: Fn(&ServiceSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.metrics.snapshot();
            if done(&snapshot) || tokio::time::Instant::now() >= deadline {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Wraps a command in a delivery at `offset`.
pub fn delivery(offset: i64, command: &Command) -> Delivery {
    ChannelCommandSource::delivery(offset, serde_json::to_vec(command).unwrap())
}

pub fn registration(user_name: &str) -> serde_json::Value {
    serde_json::json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": format!("{user_name}@example.com"),
        "userName": user_name,
        "password": "analytical-engine",
        "role": "member"
    })
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
