//! HTTP routes for liveness and counters.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod metrics;

/// Builds the complete router, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
