//! Account command service entry point.

use std::sync::Arc;

use accounts_command::application::command_handlers::CommandContext;
use accounts_command::application::dispatcher::CommandDispatcher;
use accounts_command::application::projection_rebuilder::{ProjectionRebuilder, RebuildMetrics};
use accounts_command::domain::password::BcryptHasher;
use accounts_core::clock::{Clock, SystemClock};
use accounts_core::store::ProjectionStore;
use accounts_core::transport::MessageProducer;
use accounts_service::config::ServiceConfig;
use accounts_service::error::AppError;
use accounts_service::intake::{CommandWorker, IntakeLoop};
use accounts_service::metrics::ServiceMetrics;
use accounts_service::pipeline::OutputPipeline;
use accounts_service::replay::BrokerReplaySource;
use accounts_service::routes;
use accounts_service::state::AppState;
use accounts_service::telemetry::{self, OTLP_ENDPOINT_VAR};
use accounts_service::transport::{KafkaProducer, KafkaSource};
use accounts_store::pg_projection_store::PgProjectionStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let dotenv = dotenvy::dotenv();

    let service_name =
        std::env::var("SERVICE_NAME").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_owned());
    let otlp_endpoint = std::env::var(OTLP_ENDPOINT_VAR).ok();
    let telemetry = telemetry::init(&service_name, otlp_endpoint.as_deref())?;
    if let Err(e) = dotenv {
        info!(error = %e, "no .env file loaded");
    }

    let result = run().await;
    if let Err(e) = &result {
        error!(error = %e, "service stopped");
    }
    telemetry.shutdown();
    result
}

async fn run() -> Result<(), AppError> {
    let config = ServiceConfig::from_env()?;
    info!(service = %config.service_name, "starting account command service");

    // Projection store.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_timeout)
        .connect(&config.database_url)
        .await?;
    let store = PgProjectionStore::new(pool);
    store.ensure_schema().await?;
    let store: Arc<dyn ProjectionStore> = Arc::new(store);

    // Broker clients.
    let kafka = &config.kafka;
    let producer: Arc<dyn MessageProducer> = Arc::new(KafkaProducer::connect(&kafka.brokers)?);
    let commands = KafkaSource::connect(&kafka.brokers, &kafka.request_group, &kafka.request_topic)?;
    let responses = KafkaSource::connect(
        &kafka.brokers,
        &kafka.replay_response_group,
        &kafka.replay_response_topic,
    )?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(ServiceMetrics::default());
    let rebuild_metrics = Arc::new(RebuildMetrics::default());

    let mut pipeline = OutputPipeline::spawn(
        Arc::clone(&producer),
        kafka.events_topic.clone(),
        config.output_queue_capacity,
        Arc::clone(&metrics),
    );

    let replay = Arc::new(BrokerReplaySource::new(
        producer,
        Arc::clone(&clock),
        kafka.replay_request_topic.clone(),
        &kafka.end_of_stream_token,
    ));
    let context = CommandContext {
        store: Arc::clone(&store),
        hasher: Arc::new(BcryptHasher::new(config.bcrypt_cost)),
        clock: Arc::clone(&clock),
        service_name: config.service_name.clone(),
    };
    let rebuilder = ProjectionRebuilder::new(store, replay.clone(), Arc::clone(&rebuild_metrics));
    let dispatcher = Arc::new(CommandDispatcher::new(
        context,
        rebuilder,
        config.rebuild_timeout,
        pipeline.event_sender(),
        pipeline.result_sender(),
    ));
    let intake = IntakeLoop::new(
        CommandWorker::new(dispatcher, clock, Arc::clone(&metrics)),
        config.command_concurrency,
    );

    // Health and metrics endpoint.
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint listening");
    let app = routes::router(AppState::new(metrics, rebuild_metrics));
    let mut server_shutdown = pipeline.shutdown_signal();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    let intake_shutdown = pipeline.shutdown_signal();
    let responses_shutdown = pipeline.shutdown_signal();
    let outcome = tokio::select! {
        result = intake.run(commands, intake_shutdown) => result.map_err(AppError::from),
        result = replay.run_responses(responses, responses_shutdown) => result.map_err(AppError::from),
        reason = pipeline.wait() => Err(AppError::from(reason)),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    };

    pipeline.shutdown();
    let reason = pipeline.wait().await;
    info!(reason = %reason, "output lanes stopped");
    match server.await {
        Ok(Err(e)) => warn!(error = %e, "health endpoint failed"),
        Err(e) => warn!(error = %e, "health endpoint task failed"),
        Ok(Ok(())) => {}
    }

    outcome
}
