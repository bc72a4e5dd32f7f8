//! The cross-cutting `policy_ready` flag (spec.md §4.10): true only when
//! the initial policy source compiled successfully (or a non-empty runtime
//! overlay exists) *and* the bootstrap coordinator reports `ready`.

use std::sync::atomic::{AtomicBool, Ordering};

/// Combines the file layer's compile-success signal, the runtime overlay's
/// non-emptiness, and the bootstrap coordinator's ready signal into the
/// single `policy_ready` flag that `/health/policy` reads (spec.md §4.10:
/// "becomes true when: (a) initial on-disk source compiled successfully OR
/// there is a non-empty runtime overlay, AND (b) the bootstrap coordinator
/// reports ready"; §4.8).
#[derive(Debug, Default)]
pub struct PolicyReadiness {
    file_compiled: AtomicBool,
    runtime_overlay_non_empty: AtomicBool,
    bootstrap_ready: AtomicBool,
}

impl PolicyReadiness {
    /// A readiness tracker with every input false.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the file layer's contribution: true when the initial on-disk
    /// source compiled, or a watcher-triggered reload succeeded; false on a
    /// compile failure (spec.md §4.10: "becomes false if a watcher-triggered
    /// compile fails").
    pub fn set_file_compiled(&self, ok: bool) {
        self.file_compiled.store(ok, Ordering::Release);
    }

    /// Record whether the runtime overlay currently holds at least one rule.
    /// Called after every successful runtime-overlay mutation (`POST`/`PATCH
    /// /api/policies`, `add`, `delete`) so a manager with no compilable file
    /// layer still becomes ready once a valid overlay is installed.
    pub fn set_runtime_overlay_non_empty(&self, non_empty: bool) {
        self.runtime_overlay_non_empty.store(non_empty, Ordering::Release);
    }

    /// Record the bootstrap coordinator's contribution.
    pub fn set_bootstrap_ready(&self, ok: bool) {
        self.bootstrap_ready.store(ok, Ordering::Release);
    }

    /// Whether `/health/policy` should report 200.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let policy_side = self.file_compiled.load(Ordering::Acquire) || self.runtime_overlay_non_empty.load(Ordering::Acquire);
        policy_side && self.bootstrap_ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_only_when_both_inputs_true() {
        let readiness = PolicyReadiness::new();
        assert!(!readiness.is_ready());
        readiness.set_file_compiled(true);
        assert!(!readiness.is_ready());
        readiness.set_bootstrap_ready(true);
        assert!(readiness.is_ready());
        readiness.set_file_compiled(false);
        assert!(!readiness.is_ready());
    }

    #[test]
    fn non_empty_runtime_overlay_substitutes_for_a_failed_file_compile() {
        let readiness = PolicyReadiness::new();
        readiness.set_bootstrap_ready(true);
        readiness.set_file_compiled(false);
        assert!(!readiness.is_ready());

        readiness.set_runtime_overlay_non_empty(true);
        assert!(readiness.is_ready());

        readiness.set_runtime_overlay_non_empty(false);
        assert!(!readiness.is_ready());
    }
}
