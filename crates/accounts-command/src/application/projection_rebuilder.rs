//! Catch-up of the account projection from the event log.
//!
//! Before a command is validated, the rebuilder asks the replay source for
//! every event the projection has not seen yet and applies each one to the
//! store. Individual failures are logged and counted; they never abort the
//! catch-up, and the command then proceeds against whatever the store holds.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use accounts_core::error::DomainError;
use accounts_core::message::Event;
use accounts_core::replay::EventReplaySource;
use accounts_core::store::{ProjectionStore, StoreError};
use futures::StreamExt as _;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::events::{AccountEventKind, UserUpdated};

/// Process-wide rebuild counters.
#[derive(Debug, Default)]
pub struct RebuildMetrics {
    runs: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    replay_failures: AtomicU64,
}

/// Point-in-time copy of `RebuildMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSnapshot {
    /// Rebuilds started.
    pub runs: u64,
    /// Events applied to the store.
    pub applied: u64,
    /// Events with an action the projection ignores.
    pub skipped: u64,
    /// Events that could not be applied, plus stream errors.
    pub failed: u64,
    /// Replays that could not be opened at all.
    pub replay_failures: u64,
}

impl RebuildMetrics {
    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> RebuildSnapshot {
        RebuildSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            replay_failures: self.replay_failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &RebuildReport) {
        self.applied.fetch_add(report.applied, Ordering::Relaxed);
        self.skipped.fetch_add(report.skipped, Ordering::Relaxed);
        self.failed.fetch_add(report.failed, Ordering::Relaxed);
    }
}

/// Outcome of a single rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Correlation ID sent with the replay request.
    pub correlation_id: Uuid,
    /// Events applied (a duplicate registration counts as applied).
    pub applied: u64,
    /// Events with an action the projection ignores.
    pub skipped: u64,
    /// Events that failed to apply, plus errors yielded by the stream.
    pub failed: u64,
    /// `true` if the deadline ended the replay before end-of-stream.
    pub timed_out: bool,
}

impl RebuildReport {
    fn new(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            applied: 0,
            skipped: 0,
            failed: 0,
            timed_out: false,
        }
    }
}

/// Replays outstanding events into the projection store.
pub struct ProjectionRebuilder {
    store: Arc<dyn ProjectionStore>,
    source: Arc<dyn EventReplaySource>,
    metrics: Arc<RebuildMetrics>,
}

impl std::fmt::Debug for ProjectionRebuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionRebuilder")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ProjectionRebuilder {
    /// Creates a rebuilder that reports into `metrics`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectionStore>,
        source: Arc<dyn EventReplaySource>,
        metrics: Arc<RebuildMetrics>,
    ) -> Self {
        Self {
            store,
            source,
            metrics,
        }
    }

    /// The counters this rebuilder updates.
    #[must_use]
    pub fn metrics(&self) -> &Arc<RebuildMetrics> {
        &self.metrics
    }

    /// Drains the replay source until end-of-stream or `timeout`, applying
    /// each event to the store.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` only if the replay could not be
    /// opened. Failures while draining are counted in the report instead.
    pub async fn rebuild(&self, timeout: Duration) -> Result<RebuildReport, DomainError> {
        self.metrics.runs.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        let correlation_id = Uuid::new_v4();

        let opened = tokio::time::timeout_at(deadline, self.source.replay(correlation_id, timeout))
            .await
            .map_err(|_| format!("timed out after {timeout:?}"))
            .and_then(|r| r.map_err(|e| e.to_string()));
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(reason) => {
                self.metrics.replay_failures.fetch_add(1, Ordering::Relaxed);
                return Err(DomainError::Infrastructure(format!(
                    "could not open replay: {reason}"
                )));
            }
        };

        let mut report = RebuildReport::new(correlation_id);
        loop {
            let item = match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    report.timed_out = true;
                    break;
                }
            };
            match item {
                Ok(event) => match self.apply(&event).await {
                    Ok(true) => report.applied += 1,
                    Ok(false) => {
                        debug!(action = %event.action, event_id = %event.uuid, "skipping event");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!(
                            action = %event.action,
                            event_id = %event.uuid,
                            error = %e,
                            "failed to apply event"
                        );
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "replay stream error");
                    report.failed += 1;
                }
            }
        }

        self.metrics.record(&report);
        debug!(
            %correlation_id,
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed,
            timed_out = report.timed_out,
            "projection rebuild finished"
        );
        Ok(report)
    }

    /// Applies one event. Returns `Ok(false)` if the action is not projected.
    async fn apply(&self, event: &Event) -> Result<bool, DomainError> {
        let Some(kind) = AccountEventKind::decode(event)? else {
            return Ok(false);
        };
        match kind {
            AccountEventKind::Registered(account) => {
                match self.store.insert_one(&account).await {
                    // Reserved by the register handler, or replayed before.
                    Ok(()) | Err(StoreError::Duplicate(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            AccountEventKind::Updated(UserUpdated { filter, update }) => {
                self.store.update_many(&filter.into(), &update).await?;
            }
            AccountEventKind::Deleted(filter) => {
                self.store.delete_many(&filter.into()).await?;
            }
        }
        Ok(true)
    }
}
