//! [`PolicyStore`]: the pure data shape from spec.md §3 — `file_layer`,
//! `runtime_overlay`, `runtime_only`, and the derived `active` snapshot.
//! Holds no locks and performs no I/O; [`crate::PolicyManager`] wraps one
//! behind a mutex and adds the transactional publish/persist discipline.

use leash_core::{HttpRewriteRule, PolicySet};
use serde::{Deserialize, Serialize};

/// One layer's worth of compiled rules plus its originating source text.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    /// Compiled rule tables.
    pub policy_set: PolicySet,
    /// Compiled HTTP rewrite rules.
    pub http_rewrites: Vec<HttpRewriteRule>,
    /// The Cedar-flavored source text this layer was compiled from.
    pub cedar: String,
}

/// Enforcement mode: `enforce` evaluates `active` normally; `permit-all`
/// overrides every connect/open/exec decision to allow (spec.md §4.9
/// `/api/policies/permit-all`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementMode {
    /// Normal enforcement: `active` decides.
    Enforce,
    /// Permissive override: every operation is allowed regardless of
    /// `active`'s rules.
    PermitAll,
}

/// A point-in-time view of the store, shaped for the control plane's
/// `GET /api/policies` response (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The currently effective rule set.
    pub active: PolicySet,
    /// The currently effective HTTP rewrites.
    pub active_http: Vec<HttpRewriteRule>,
    /// The on-disk (file) layer.
    pub file: PolicySet,
    /// The runtime overlay layer.
    pub runtime: PolicySet,
    /// Current runtime overlay source text.
    pub cedar_runtime: String,
    /// Current file layer source text.
    pub cedar_file: String,
    /// The overlay source to restore on a future re-enforce, captured at
    /// the moment permit-all was enabled.
    pub cedar_baseline: String,
    /// Current enforcement mode.
    pub enforcement_mode: EnforcementMode,
}

/// The PolicyStore data shape: `file_layer`, `runtime_overlay`,
/// `runtime_only`, plus the derived `active` (spec.md §3).
#[derive(Debug, Clone)]
pub struct PolicyStore {
    file_layer: Layer,
    runtime_overlay: Layer,
    runtime_only: bool,
    mode: EnforcementMode,
    /// Overlay source to restore when returning to `enforce` mode.
    cedar_prev: String,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self {
            file_layer: Layer::default(),
            runtime_overlay: Layer::default(),
            runtime_only: false,
            mode: EnforcementMode::Enforce,
            cedar_prev: String::new(),
        }
    }
}

impl PolicyStore {
    /// An empty store: no file layer, no runtime overlay, enforcing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `active = runtime ⊕ file` (runtime first) when `runtime_only` is
    /// false; `active = runtime` exactly when true (spec.md §4.3). Under
    /// `permit-all` mode `active` is synthesized as
    /// [`PolicySet::permit_all`] regardless of `runtime_only` or either
    /// layer's contents — the file layer is bypassed entirely, matching the
    /// glossary's "a permissive overlay is active; the file layer is
    /// bypassed". This is the single function both the kernel shim's
    /// `RuleTables` and the proxy's `ActiveState` are derived from, so the
    /// override reaches every enforcement point published from it.
    #[must_use]
    pub fn active(&self) -> PolicySet {
        if self.mode == EnforcementMode::PermitAll {
            return PolicySet::permit_all();
        }
        if self.runtime_only {
            return self.runtime_overlay.policy_set.clone();
        }
        self.runtime_overlay.policy_set.compose_over(&self.file_layer.policy_set)
    }

    /// The HTTP rewrites in effect: runtime overlay rewrites take
    /// precedence (checked first) over file-layer rewrites.
    #[must_use]
    pub fn active_http(&self) -> Vec<HttpRewriteRule> {
        if self.runtime_only {
            return self.runtime_overlay.http_rewrites.clone();
        }
        let mut combined = self.runtime_overlay.http_rewrites.clone();
        combined.extend(self.file_layer.http_rewrites.iter().cloned());
        combined
    }

    /// Current enforcement mode.
    #[must_use]
    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Whether `runtime_only` is set (file layer ignored).
    #[must_use]
    pub fn runtime_only(&self) -> bool {
        self.runtime_only
    }

    /// Replace the file layer.
    pub fn set_file_layer(&mut self, layer: Layer) {
        self.file_layer = layer;
    }

    /// Replace the runtime overlay.
    pub fn set_runtime_overlay(&mut self, layer: Layer) {
        self.runtime_overlay = layer;
    }

    /// Set `runtime_only`.
    pub fn set_runtime_only(&mut self, runtime_only: bool) {
        self.runtime_only = runtime_only;
    }

    /// Enable `permit-all`, stashing the current runtime overlay source so
    /// a later `enforce-apply` can restore it.
    pub fn enable_permit_all(&mut self) {
        self.cedar_prev = self.runtime_overlay.cedar.clone();
        self.mode = EnforcementMode::PermitAll;
    }

    /// Clear the runtime overlay and return to `enforce` mode (spec.md
    /// §4.9 `/api/policies/enforce-apply`).
    pub fn enforce_apply(&mut self) {
        self.runtime_overlay = Layer::default();
        self.mode = EnforcementMode::Enforce;
        self.cedar_prev.clear();
    }

    /// The file layer's source text.
    #[must_use]
    pub fn cedar_file(&self) -> &str {
        &self.file_layer.cedar
    }

    /// The runtime overlay's source text.
    #[must_use]
    pub fn cedar_runtime(&self) -> &str {
        &self.runtime_overlay.cedar
    }

    /// The overlay source stashed at the moment permit-all was enabled.
    #[must_use]
    pub fn cedar_baseline(&self) -> &str {
        &self.cedar_prev
    }

    /// Render a full snapshot for the control plane.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active: self.active(),
            active_http: self.active_http(),
            file: self.file_layer.policy_set.clone(),
            runtime: self.runtime_overlay.policy_set.clone(),
            cedar_runtime: self.runtime_overlay.cedar.clone(),
            cedar_file: self.file_layer.cedar.clone(),
            cedar_baseline: self.cedar_prev.clone(),
            enforcement_mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_core::{Action, ExecRule};

    fn allow_exec(path: &str) -> ExecRule {
        ExecRule::new(Action::Allow, path, false)
    }

    #[test]
    fn active_composes_runtime_before_file_by_default() {
        let mut store = PolicyStore::new();
        let mut file = Layer::default();
        file.policy_set.exec.push(allow_exec("/usr/bin/git"));
        store.set_file_layer(file);

        let mut runtime = Layer::default();
        runtime.policy_set.exec.push(allow_exec("/usr/bin/curl"));
        store.set_runtime_overlay(runtime);

        let active = store.active();
        assert_eq!(active.exec.len(), 2);
        assert_eq!(active.exec[0].path.as_str(), "/usr/bin/curl");
        assert_eq!(active.exec[1].path.as_str(), "/usr/bin/git");
    }

    #[test]
    fn runtime_only_ignores_file_layer() {
        let mut store = PolicyStore::new();
        let mut file = Layer::default();
        file.policy_set.exec.push(allow_exec("/usr/bin/git"));
        store.set_file_layer(file);
        store.set_runtime_only(true);

        assert!(store.active().exec.is_empty());
    }

    #[test]
    fn permit_all_overrides_a_denying_file_layer() {
        let mut store = PolicyStore::new();
        let mut file = Layer::default();
        file.policy_set.connect.push(leash_core::ConnectRule::new(Action::Deny, None, None, None, true).unwrap());
        file.policy_set.default_allow = false;
        file.policy_set.default_explicit = true;
        store.set_file_layer(file);
        assert_eq!(store.active().check_connect(Some("evil.example"), None, 443), Action::Deny);

        store.enable_permit_all();
        assert_eq!(store.mode(), EnforcementMode::PermitAll);
        assert_eq!(store.active().check_connect(Some("evil.example"), None, 443), Action::Allow);
        assert_eq!(store.active().check_open("/etc/shadow"), Action::Allow);
        assert_eq!(store.active().check_exec("/usr/bin/anything"), Action::Allow);
    }

    #[test]
    fn enforce_apply_clears_overlay_and_restores_mode() {
        let mut store = PolicyStore::new();
        let mut runtime = Layer::default();
        runtime.cedar = "permit (...)".to_string();
        store.set_runtime_overlay(runtime);
        store.enable_permit_all();
        assert_eq!(store.mode(), EnforcementMode::PermitAll);

        store.enforce_apply();
        assert_eq!(store.mode(), EnforcementMode::Enforce);
        assert!(store.cedar_runtime().is_empty());
    }
}
