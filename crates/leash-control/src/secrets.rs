//! `/api/secrets*` handlers (spec.md §4.7, §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use leash_log::Event;
use leash_secrets::SecretEntry;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/secrets`: `{id: {placeholder, activations, value?}}`, values
/// always redacted.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<HashMap<String, SecretEntry>> {
    Json(state.secrets.fetch_all_redacted())
}

/// `POST /api/secrets/{id}` body.
#[derive(Debug, Deserialize)]
pub struct CreateSecretBody {
    /// The real secret value.
    pub value: String,
}

/// `POST /api/secrets/{id}`: create or idempotently fetch a secret.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CreateSecretBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let placeholder = state.secrets.create(id.clone(), body.value)?;
    state.logger.emit(Event::new("secret.create").field("id", id)).await;
    Ok(Json(serde_json::json!({ "placeholder": placeholder })))
}
