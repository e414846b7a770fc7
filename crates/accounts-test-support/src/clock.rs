//! Pinned clock for TTL and event-timestamp assertions.

use accounts_core::clock::Clock;
use chrono::{DateTime, TimeZone, Utc};

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The instant every test suite in this workspace agrees on:
    /// 2026-01-15T10:00:00Z.
    #[must_use]
    pub fn reference() -> Self {
        Self(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }

    /// Unix seconds of the pinned instant, handy for command timestamps.
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
