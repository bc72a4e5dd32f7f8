//! `/api/policies*` handlers (spec.md §4.9).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use leash_dsl::{compile, lint, render_statement, statement_id, structural_eq};
use leash_log::Event;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::lines::{render_active_lines, snapshot_dto, LineDto, PolicySnapshotDto};
use crate::state::{broadcast_snapshot, AppState};

/// Body accepted by `POST /api/policies` and `POST /api/policies/persist`,
/// and `POST /api/policies/add`: raw cedar text, either wrapped in `{cedar}`
/// or sent as the whole body (axum's `Json` extractor requires the wrapped
/// form; the control UI always sends it that way).
#[derive(Debug, Deserialize)]
pub struct CedarBody {
    /// Cedar-flavored policy source.
    pub cedar: String,
    /// Bypass the "empty program" / "removes all connect allows" safety
    /// checks.
    #[serde(default)]
    pub force: bool,
}

/// `GET /api/policies` response: the snapshot plus the re-rendered lines.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    #[serde(flatten)]
    snapshot: PolicySnapshotDto,
    lines: Vec<LineDto>,
}

async fn snapshot_response(state: &AppState) -> SnapshotResponse {
    let snapshot = state.policy.snapshot().await;
    let lines = render_active_lines(&snapshot);
    let dto = snapshot_dto(&snapshot, state.readiness.is_ready());
    SnapshotResponse { snapshot: dto, lines }
}

/// `GET /api/policies`.
pub async fn get_policies(State(state): State<Arc<AppState>>) -> Json<SnapshotResponse> {
    Json(snapshot_response(&state).await)
}

/// `POST /api/policies`: replace the runtime overlay wholesale.
pub async fn post_policies(State(state): State<Arc<AppState>>, Json(body): Json<CedarBody>) -> Result<Json<SnapshotResponse>, ApiError> {
    let compiled = compile(&body.cedar, "cedar-runtime.cedar")?;
    if compiled.policy_set.is_empty() && !body.force {
        return Err(ApiError::EmptyProgram);
    }
    if !compiled.policy_set.has_connect_allow() && !body.force {
        return Err(ApiError::UnsafePolicy);
    }

    state.policy.set_runtime_rules(compiled.policy_set, compiled.http_rewrites, body.cedar).await?;
    state.logger.emit(Event::new("policy.update").field("source", "post")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `POST /api/policies/persist`.
#[derive(Debug, Deserialize, Default)]
pub struct PersistBody {
    /// Optional replacement source; if absent, the current runtime overlay
    /// source is promoted as-is.
    pub cedar: Option<String>,
    /// Bypass the safety checks.
    #[serde(default)]
    pub force: bool,
}

/// `POST /api/policies/persist`: promote the (optionally replaced) runtime
/// overlay to the file layer and write it to the canonical file.
pub async fn persist(State(state): State<Arc<AppState>>, body: Option<Json<PersistBody>>) -> Result<Json<SnapshotResponse>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let cedar = match body.cedar {
        Some(cedar) => cedar,
        None => state.policy.snapshot().await.cedar_runtime,
    };

    state.policy.persist_runtime_to_file(&cedar, body.force).await?;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `POST /api/policies/validate`: lint+compile dry-run, no mutation.
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    /// Number of statements parsed.
    statements: usize,
    /// Number of compiled rules, across all families.
    rules: usize,
    /// Lint findings.
    issues: Vec<leash_dsl::LintIssue>,
}

/// `POST /api/policies/validate`.
pub async fn validate(Json(body): Json<CedarBody>) -> Result<Json<ValidateResponse>, ApiError> {
    let compiled = compile(&body.cedar, "cedar-validate.cedar")?;
    let issues = lint(&compiled.program, &compiled.policy_set, body.force);
    Ok(Json(ValidateResponse {
        statements: compiled.program.statements.len(),
        rules: compiled.policy_set.len(),
        issues,
    }))
}

/// `POST /api/policies/permit-all`.
pub async fn permit_all(State(state): State<Arc<AppState>>) -> Result<Json<SnapshotResponse>, ApiError> {
    state.policy.permit_all().await?;
    state.logger.emit(Event::new("policy.update").field("source", "permit-all")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `POST /api/policies/enforce-apply`.
pub async fn enforce_apply(State(state): State<Arc<AppState>>) -> Result<Json<SnapshotResponse>, ApiError> {
    state.policy.enforce_apply().await?;
    state.logger.emit(Event::new("policy.update").field("source", "enforce-apply")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `GET /api/policies/lines`.
#[derive(Debug, Serialize)]
pub struct LinesResponse {
    lines: Vec<LineDto>,
}

/// `GET /api/policies/lines`.
pub async fn lines(State(state): State<Arc<AppState>>) -> Json<LinesResponse> {
    let snapshot = state.policy.snapshot().await;
    Json(LinesResponse { lines: render_active_lines(&snapshot) })
}

/// `POST /api/policies/add` body: a single statement's cedar text.
#[derive(Debug, Deserialize)]
pub struct AddBody {
    /// The statement to add, as cedar source text (exactly one statement).
    pub cedar: String,
}

/// `POST /api/policies/add`: prepend a single statement to the runtime
/// overlay, idempotently (structural-equality de-duplication against the
/// existing program, mirroring PATCH's `add` semantics at spec.md §4.9).
pub async fn add(State(state): State<Arc<AppState>>, Json(body): Json<AddBody>) -> Result<Json<SnapshotResponse>, ApiError> {
    let addition = compile(&body.cedar, "cedar-add.cedar")?;
    let Some(new_stmt) = addition.program.statements.first() else {
        return Err(ApiError::EmptyProgram);
    };

    let current_cedar = state.policy.snapshot().await.cedar_runtime;
    let current = compile(&current_cedar, "cedar-runtime.cedar")?;
    if current.program.statements.iter().any(|existing| structural_eq(existing, new_stmt)) {
        return Ok(Json(snapshot_response(&state).await));
    }

    let merged = format!("{}\n{}", render_statement(new_stmt), current_cedar);
    let merged_compiled = compile(&merged, "cedar-runtime.cedar")?;
    if merged_compiled.policy_set.is_empty() {
        return Err(ApiError::EmptyProgram);
    }
    if !merged_compiled.policy_set.has_connect_allow() {
        return Err(ApiError::UnsafePolicy);
    }

    state.policy.set_runtime_rules(merged_compiled.policy_set, merged_compiled.http_rewrites, merged).await?;
    state.logger.emit(Event::new("policy.update").field("source", "add")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `POST /api/policies/delete` body: match by stable id or literal cedar.
#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    /// Stable statement id (see [`leash_dsl::statement_id`]).
    #[serde(default)]
    pub id: Option<String>,
    /// Exact cedar statement text, compared structurally.
    #[serde(default)]
    pub cedar: Option<String>,
    /// Bypass the "removes all connect allows" safety check.
    #[serde(default)]
    pub force: bool,
}

/// `POST /api/policies/delete`: remove a statement by id or literal cedar
/// text from the runtime overlay.
pub async fn delete(State(state): State<Arc<AppState>>, Json(body): Json<DeleteBody>) -> Result<Json<SnapshotResponse>, ApiError> {
    let target_stmt = match &body.cedar {
        Some(cedar) => compile(cedar, "cedar-delete.cedar")?.program.statements.into_iter().next(),
        None => None,
    };

    let current_cedar = state.policy.snapshot().await.cedar_runtime;
    let current = compile(&current_cedar, "cedar-runtime.cedar")?;

    let remaining: Vec<_> = current
        .program
        .statements
        .iter()
        .filter(|stmt| {
            if let Some(id) = &body.id {
                if &statement_id(stmt) == id {
                    return false;
                }
            }
            if let Some(target) = &target_stmt {
                if structural_eq(stmt, target) {
                    return false;
                }
            }
            true
        })
        .map(render_statement)
        .collect();

    let merged = remaining.join("\n");
    let merged_compiled = compile(&merged, "cedar-runtime.cedar")?;
    if merged_compiled.policy_set.is_empty() && !body.force {
        return Err(ApiError::EmptyProgram);
    }
    if !merged_compiled.policy_set.has_connect_allow() && !body.force {
        return Err(ApiError::UnsafePolicy);
    }

    state.policy.set_runtime_rules(merged_compiled.policy_set, merged_compiled.http_rewrites, merged).await?;
    state.logger.emit(Event::new("policy.update").field("source", "delete")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// `PATCH /api/policies` body (spec.md §4.9): `remove` entries are resolved
/// first (by stable id or exact cedar text), `add` entries are then
/// prepended and de-duplicated by structural equality against the
/// remainder.
#[derive(Debug, Deserialize)]
pub struct PatchBody {
    /// Statements to add, as cedar source (one or more statements each).
    #[serde(default)]
    pub add: Vec<String>,
    /// Statements to remove, by stable id or exact cedar text.
    #[serde(default)]
    pub remove: Vec<String>,
    /// `"enforce"` additionally clears the runtime overlay and persists the
    /// result to the file layer in the same transaction.
    #[serde(default)]
    pub apply_mode: Option<String>,
    /// Bypass the safety checks.
    #[serde(default)]
    pub force: bool,
}

/// `PATCH /api/policies`.
pub async fn patch(State(state): State<Arc<AppState>>, Query(query): Query<PatchQuery>, Json(body): Json<PatchBody>) -> Result<Json<SnapshotResponse>, ApiError> {
    let force = body.force || query.force.unwrap_or(false);
    let current_cedar = state.policy.snapshot().await.cedar_runtime;
    let current = compile(&current_cedar, "cedar-runtime.cedar")?;

    let remaining: Vec<_> = current
        .program
        .statements
        .iter()
        .filter(|stmt| {
            let id = statement_id(stmt);
            let rendered = render_statement(stmt);
            !body.remove.iter().any(|target| *target == id || *target == rendered)
        })
        .cloned()
        .collect();

    let mut additions = Vec::new();
    for cedar in &body.add {
        let compiled = compile(cedar, "cedar-patch-add.cedar")?;
        for stmt in compiled.program.statements {
            let already_present = remaining.iter().any(|existing| structural_eq(existing, &stmt))
                || additions.iter().any(|existing| structural_eq(existing, &stmt));
            if !already_present {
                additions.push(stmt);
            }
        }
    }

    let mut rendered_lines: Vec<String> = additions.iter().map(render_statement).collect();
    rendered_lines.extend(remaining.iter().map(render_statement));
    let merged = rendered_lines.join("\n");

    let merged_compiled = compile(&merged, "cedar-runtime.cedar")?;
    if merged_compiled.policy_set.is_empty() && !force {
        return Err(ApiError::EmptyProgram);
    }
    if !merged_compiled.policy_set.has_connect_allow() && !force {
        return Err(ApiError::UnsafePolicy);
    }

    if body.apply_mode.as_deref() == Some("enforce") {
        state.policy.persist_runtime_to_file(&merged, force).await?;
        state.policy.enforce_apply().await?;
    } else {
        state.policy.set_runtime_rules(merged_compiled.policy_set, merged_compiled.http_rewrites, merged).await?;
    }

    state.logger.emit(Event::new("policy.update").field("source", "patch")).await;
    broadcast_snapshot(&state).await;
    Ok(Json(snapshot_response(&state).await))
}

/// Query-string companion to [`PatchBody`]'s `force`, so `force=1` works as
/// a query parameter too (spec.md §4.11's `force=1` escape hatch is
/// documented as a query flag on several endpoints).
#[derive(Debug, Deserialize, Default)]
pub struct PatchQuery {
    force: Option<bool>,
}
