//! Counters endpoint.

use accounts_command::application::projection_rebuilder::RebuildSnapshot;
use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::metrics::ServiceSnapshot;
use crate::state::AppState;

/// Metrics response.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Intake and publishing counters.
    #[serde(flatten)]
    pub service: ServiceSnapshot,
    /// Projection rebuild counters.
    pub rebuild: RebuildSnapshot,
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        service: state.metrics.snapshot(),
        rebuild: state.rebuild.snapshot(),
    })
}

/// Returns the metrics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}
