//! JSON shapes for `GET /api/policies` and `GET /api/policies/lines`
//! (spec.md §4.9), and the rendering that turns a [`Snapshot`] into them.

use leash_core::PolicySet;
use leash_dsl::{compile, humanize_statement, render_statement, statement_id};
use leash_policy::{EnforcementMode, Snapshot};
use serde::Serialize;

/// `GET /api/policies` response shape: `{active, file, runtime, cedarRuntime,
/// cedarFile, cedarBaseline, enforcementMode}` plus a `ready` banner field
/// (spec.md §7's `NotReady`: "surfaced ... via a banner field in
/// `/api/policies`").
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshotDto {
    /// The currently effective rule set.
    pub active: PolicySet,
    /// The on-disk (file) layer.
    pub file: PolicySet,
    /// The runtime overlay layer.
    pub runtime: PolicySet,
    #[serde(rename = "cedarRuntime")]
    /// Current runtime overlay source text.
    pub cedar_runtime: String,
    #[serde(rename = "cedarFile")]
    /// Current file layer source text.
    pub cedar_file: String,
    #[serde(rename = "cedarBaseline")]
    /// Overlay source stashed when permit-all was enabled.
    pub cedar_baseline: String,
    #[serde(rename = "enforcementMode")]
    /// Current enforcement mode.
    pub enforcement_mode: EnforcementMode,
    /// Whether `policy_ready` is currently true (spec.md §4.10).
    pub ready: bool,
}

/// `GET /api/policies/lines` element shape.
#[derive(Debug, Clone, Serialize)]
pub struct LineDto {
    /// Stable structural id (see [`leash_dsl::statement_id`]).
    pub id: String,
    /// `"permit"` or `"forbid"`.
    pub effect: String,
    /// A short human sentence describing the statement's effect.
    pub humanized: String,
    /// The statement's canonical source text.
    pub cedar: String,
    /// Source-order position.
    pub sequence: usize,
}

/// Build the `GET /api/policies` response shape from a [`Snapshot`].
#[must_use]
pub fn snapshot_dto(snapshot: &Snapshot, ready: bool) -> PolicySnapshotDto {
    PolicySnapshotDto {
        active: snapshot.active.clone(),
        file: snapshot.file.clone(),
        runtime: snapshot.runtime.clone(),
        cedar_runtime: snapshot.cedar_runtime.clone(),
        cedar_file: snapshot.cedar_file.clone(),
        cedar_baseline: snapshot.cedar_baseline.clone(),
        enforcement_mode: snapshot.enforcement_mode,
        ready,
    }
}

/// Render the active program (runtime overlay ahead of file layer, matching
/// `PolicySet::compose_over`'s ordering) into UI lines. If the concatenated
/// source fails to recompile — which should not happen, since both layers
/// compiled successfully on their own — the lines list is returned empty
/// rather than failing the whole response.
#[must_use]
pub fn render_active_lines(snapshot: &Snapshot) -> Vec<LineDto> {
    let combined = [snapshot.cedar_runtime.as_str(), snapshot.cedar_file.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let Ok(compiled) = compile(&combined, "active.cedar") else {
        return Vec::new();
    };

    compiled
        .program
        .statements
        .iter()
        .map(|stmt| LineDto {
            id: statement_id(stmt),
            effect: match stmt.effect {
                leash_dsl::Effect::Permit => "permit".to_string(),
                leash_dsl::Effect::Forbid => "forbid".to_string(),
            },
            humanized: humanize_statement(stmt),
            cedar: render_statement(stmt),
            sequence: stmt.sequence,
        })
        .collect()
}
