//! Intake and publishing counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters for the intake loop and the output lanes.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    commands_received: AtomicU64,
    commands_accepted: AtomicU64,
    commands_expired: AtomicU64,
    commands_dropped: AtomicU64,
    events_published: AtomicU64,
    acks_published: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of `ServiceMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceSnapshot {
    /// Deliveries taken off the command source.
    pub commands_received: u64,
    /// Commands handed to the dispatcher.
    pub commands_accepted: u64,
    /// Commands ignored because their TTL had passed.
    pub commands_expired: u64,
    /// Deliveries that were not valid commands.
    pub commands_dropped: u64,
    /// Events published.
    pub events_published: u64,
    /// Acknowledgements published.
    pub acks_published: u64,
    /// Publish attempts that failed.
    pub publish_failures: u64,
}

impl ServiceMetrics {
    /// A delivery was taken off the command source.
    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A command was handed to the dispatcher.
    pub fn command_accepted(&self) {
        self.commands_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// A command was ignored because its TTL had passed.
    pub fn command_expired(&self) {
        self.commands_expired.fetch_add(1, Ordering::Relaxed);
    }

    /// A delivery was not a valid command.
    pub fn command_dropped(&self) {
        self.commands_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// An event was published.
    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// An acknowledgement was published.
    pub fn ack_published(&self) {
        self.acks_published.fetch_add(1, Ordering::Relaxed);
    }

    /// A publish attempt failed.
    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            commands_received: self.commands_received.load(Ordering::Relaxed),
            commands_accepted: self.commands_accepted.load(Ordering::Relaxed),
            commands_expired: self.commands_expired.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            acks_published: self.acks_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
