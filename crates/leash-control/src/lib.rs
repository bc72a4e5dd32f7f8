//! Leash Control - the HTTP + WebSocket policy control plane (C11):
//! `/api/policies*`, `/api/secrets*`, `/healthz`, `/health/policy`, and the
//! `/api` WebSocket hub (spec.md §4.9).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod health;
mod lines;
mod policies;
mod secrets;
mod state;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use error::ApiError;
pub use lines::{LineDto, PolicySnapshotDto};
pub use state::{broadcast_snapshot, spawn_event_forwarder, AppState, EventsHub, WsEnvelope, HUB_QUEUE_CAPACITY};

/// Build the control plane's router over a shared [`AppState`]. CORS is
/// permissive by default: the control UI is served from a different origin
/// during development, and this runtime has no cookie-based session to
/// protect (spec.md §4.9a's enrichment note on `tower-http`'s `CorsLayer`).
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/health/policy", get(health::health_policy))
        .route(
            "/api/policies",
            get(policies::get_policies).post(policies::post_policies).patch(policies::patch),
        )
        .route("/api/policies/persist", post(policies::persist))
        .route("/api/policies/validate", post(policies::validate))
        .route("/api/policies/permit-all", post(policies::permit_all))
        .route("/api/policies/enforce-apply", post(policies::enforce_apply))
        .route("/api/policies/lines", get(policies::lines))
        .route("/api/policies/add", post(policies::add))
        .route("/api/policies/delete", post(policies::delete))
        .route("/api/secrets", get(secrets::list))
        .route("/api/secrets/{id}", post(secrets::create))
        .route("/api", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
