//! Shared application state.

use std::sync::Arc;

use accounts_command::application::projection_rebuilder::RebuildMetrics;

use crate::metrics::ServiceMetrics;

/// State shared by the health and metrics handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Intake and publishing counters.
    pub metrics: Arc<ServiceMetrics>,
    /// Projection rebuild counters.
    pub rebuild: Arc<RebuildMetrics>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(metrics: Arc<ServiceMetrics>, rebuild: Arc<RebuildMetrics>) -> Self {
        Self { metrics, rebuild }
    }
}
