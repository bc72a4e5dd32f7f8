//! `/healthz` and `/health/policy` (spec.md §4.8, §4.10).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

/// `GET /healthz`: plain liveness, always 200 once the process is serving.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `GET /health/policy`: readiness, 200 only once bootstrap has completed
/// and the current policy source compiled successfully.
pub async fn health_policy(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
