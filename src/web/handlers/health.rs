//! Health check HTTP handler

use axum::{extract::State, response::IntoResponse};

use crate::offline::WorkerState;
use crate::web::{
    AppState,
    responses::{HealthResponse, ok},
};

/// Health check endpoint
///
/// Reports `healthy` once an offline worker is active, `degraded` otherwise
/// (requests are still proxied, just without offline caching).
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let worker_state = state.host.state().await;
    let status = match worker_state {
        Some(WorkerState::Activated) => "healthy",
        _ => "degraded",
    };

    ok(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_name: state.config.worker.cache_name.clone(),
        worker_state: worker_state.map(|s| s.to_string()),
        clients: state.host.client_count().await,
        uptime_seconds: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}
