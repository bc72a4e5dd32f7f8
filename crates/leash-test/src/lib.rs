//! Shared test fixtures for the Leash manager runtime's crates. Not
//! published; consumed only as a `[dev-dependencies]` target, mirroring the
//! teacher's `astrid-test` crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary shared+private directory pair laid out like the filesystem
/// surface described in spec.md §6.
pub struct TempLeashDirs {
    _shared_guard: TempDir,
    _private_guard: TempDir,
    shared: PathBuf,
    private: PathBuf,
}

impl TempLeashDirs {
    /// Create a fresh pair of temp directories.
    ///
    /// # Panics
    ///
    /// Panics if the underlying temp directories cannot be created; this is
    /// a test-only helper and such a failure means the test environment is
    /// broken.
    #[must_use]
    pub fn new() -> Self {
        let shared_guard = tempfile::tempdir().expect("create shared temp dir");
        let private_guard = tempfile::tempdir().expect("create private temp dir");
        let shared = shared_guard.path().to_path_buf();
        let private = private_guard.path().to_path_buf();
        Self {
            _shared_guard: shared_guard,
            _private_guard: private_guard,
            shared,
            private,
        }
    }

    /// Path to the shared (world-readable) directory.
    #[must_use]
    pub fn shared(&self) -> &Path {
        &self.shared
    }

    /// Path to the private (0700) directory.
    #[must_use]
    pub fn private(&self) -> &Path {
        &self.private
    }

    /// Path to the canonical policy file within the shared directory.
    #[must_use]
    pub fn policy_path(&self) -> PathBuf {
        self.shared.join("policy.cedar")
    }

    /// Path to the bootstrap-ready marker within the shared directory.
    #[must_use]
    pub fn bootstrap_marker_path(&self) -> PathBuf {
        self.shared.join("bootstrap.ready")
    }

    /// Path to the manager's own `ready` sentinel within the shared directory.
    #[must_use]
    pub fn ready_path(&self) -> PathBuf {
        self.shared.join("ready")
    }
}

impl Default for TempLeashDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// A small but representative policy source covering all three rule
/// families plus an HTTP rewrite, used across multiple crates' test suites.
#[must_use]
pub fn sample_policy() -> &'static str {
    r#"
permit (principal, action == Action::"FileOpen", resource) when { resource in [ Dir::"/workspace" ] };
forbid (principal, action == Action::"FileOpen", resource) when { resource in [ File::"/etc/shadow" ] };
permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/usr/bin/git" ] };
permit (principal, action == Action::"NetConnect", resource) when { resource in [ Host::"api.anthropic.com" ] };
forbid (principal, action == Action::"NetConnect", resource);
permit (principal, action == Action::"HttpRewrite", resource) when { context.header == "Authorization" && context.value == "Bearer REDACTED" };
"#
    .trim()
}

/// A bootstrap-ready marker JSON body with the given timestamp, matching
/// the `{pid, hostname, timestamp}` shape in spec.md §6.
#[must_use]
pub fn bootstrap_marker_json(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    serde_json::json!({
        "pid": 4242,
        "hostname": "target-container",
        "timestamp": timestamp.to_rfc3339(),
    })
    .to_string()
}
