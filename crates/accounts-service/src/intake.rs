//! The command intake loop.
//!
//! Deliveries are acknowledged to the transport as soon as they are
//! received, before any processing, so a command is acted on at most once.
//! Each delivery is then handled in its own task; the loop waits for a free
//! worker slot but never for a task to finish.

use std::sync::Arc;

use accounts_command::application::dispatcher::CommandDispatcher;
use accounts_core::clock::Clock;
use accounts_core::message::Command;
use accounts_core::transport::{CommandSource, Delivery, TransportError};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info, warn};

use crate::metrics::ServiceMetrics;

/// Validates one delivery and hands it to the dispatcher.
#[derive(Clone)]
pub struct CommandWorker {
    dispatcher: Arc<CommandDispatcher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
}

impl std::fmt::Debug for CommandWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWorker")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl CommandWorker {
    /// Creates a worker.
    #[must_use]
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            metrics,
        }
    }

    /// Decodes `payload` and dispatches it unless it is malformed,
    /// incomplete or expired. Dropped commands get no acknowledgement.
    pub async fn process(&self, payload: &[u8]) {
        let command: Command = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "dropping undecodable command");
                self.metrics.command_dropped();
                return;
            }
        };

        if command.response_topic.is_empty() {
            warn!(command_id = %command.uuid, "dropping command with empty response topic");
            self.metrics.command_dropped();
            return;
        }
        if command.action.is_empty() {
            warn!(command_id = %command.uuid, "dropping command with empty action");
            self.metrics.command_dropped();
            return;
        }
        if command.is_expired(self.clock.now()) {
            debug!(command_id = %command.uuid, "command expired, ignoring");
            self.metrics.command_expired();
            return;
        }

        self.metrics.command_accepted();
        let command_id = command.uuid;
        if let Err(e) = self.dispatcher.dispatch(command).await {
            error!(%command_id, error = %e, "command outcome could not be enqueued");
        }
    }
}

/// Pulls deliveries off a `CommandSource` and fans them out to workers.
#[derive(Debug)]
pub struct IntakeLoop {
    worker: CommandWorker,
    permits: Arc<Semaphore>,
}

impl IntakeLoop {
    /// Creates a loop running at most `concurrency` commands at once.
    #[must_use]
    pub fn new(worker: CommandWorker, concurrency: usize) -> Self {
        Self {
            worker,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Consumes `source` until it is exhausted, `shutdown` fires, or it
    /// reports a fatal error. In-flight commands are left to finish.
    ///
    /// # Errors
    ///
    /// Returns the fatal `TransportError` that ended the loop.
    pub async fn run<S: CommandSource>(
        &self,
        mut source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        info!("listening for commands");
        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = source.next_delivery() => next,
            };
            let delivery = match next {
                None => break,
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) if e.is_fatal() => return Err(e),
                Some(Err(e)) => {
                    warn!(error = %e, "failed to receive command");
                    continue;
                }
            };
            self.worker.metrics.command_received();
            claim(&source, &delivery).await;

            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                break;
            };
            let worker = self.worker.clone();
            tokio::spawn(async move {
                worker.process(&delivery.payload).await;
                drop(permit);
            });
        }
        info!("command intake stopped");
        Ok(())
    }
}

async fn claim<S: CommandSource>(source: &S, delivery: &Delivery) {
    if let Err(e) = source.acknowledge(delivery).await {
        warn!(
            topic = %delivery.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            error = %e,
            "failed to acknowledge delivery"
        );
    }
}
