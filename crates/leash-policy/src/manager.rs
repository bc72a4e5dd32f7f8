//! [`PolicyManager`]: the mutex-protected owner of a [`PolicyStore`],
//! implementing the transactional publish discipline and canonical-file
//! persistence from spec.md §4.3.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use leash_core::{HttpRewriteRule, PolicySet};
use leash_dsl::compile;
use leash_kernel::{KernelShim, RuleTables, ShimErrorClass};
use leash_log::{Event, LoggerHandle};
use tokio::sync::{watch, Mutex};

use crate::error::{PolicyError, PolicyResult};
use crate::store::{Layer, PolicyStore, Snapshot};

/// The published `active` view that C6 (kernel shim) and C7 (MITM proxy)
/// observe as a linearizable sequence of snapshots (spec.md §5).
#[derive(Debug, Clone, Default)]
pub struct PublishedSnapshot {
    /// The currently effective rule tables.
    pub policy_set: PolicySet,
    /// The currently effective HTTP rewrites.
    pub http_rewrites: Vec<HttpRewriteRule>,
}

/// Owns the [`PolicyStore`] behind a single mutex (spec.md §5: "protected by
/// a single mutex covering all four sub-tables plus the mode flag and cedar
/// text"), the kernel shim, the logger, and the watch channel C7/C6
/// subscribe to for the published `active` snapshot.
pub struct PolicyManager {
    store: Mutex<PolicyStore>,
    kernel: Arc<dyn KernelShim>,
    logger: LoggerHandle,
    snapshot_tx: watch::Sender<PublishedSnapshot>,
    policy_path: PathBuf,
}

impl PolicyManager {
    /// Construct a manager over an empty store. Returns the manager plus a
    /// receiver for the published snapshot stream; clone the receiver for
    /// every consumer (kernel shim installer task, proxy).
    pub fn new(kernel: Arc<dyn KernelShim>, logger: LoggerHandle, policy_path: impl Into<PathBuf>) -> (Self, watch::Receiver<PublishedSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(PublishedSnapshot::default());
        let manager = Self { store: Mutex::new(PolicyStore::new()), kernel, logger, snapshot_tx, policy_path: policy_path.into() };
        (manager, snapshot_rx)
    }

    /// The canonical policy file path this manager persists to.
    #[must_use]
    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    /// `Snapshot` operation (spec.md §4.3): the full four-table view plus
    /// mode and cedar text.
    pub async fn snapshot(&self) -> Snapshot {
        self.store.lock().await.snapshot()
    }

    /// `GetActiveRules` operation (spec.md §4.3).
    pub async fn active_rules(&self) -> (PolicySet, Vec<HttpRewriteRule>) {
        let store = self.store.lock().await;
        (store.active(), store.active_http())
    }

    /// Called by the policy watcher (C5) after it has read and compiled the
    /// canonical file directly off disk. No persistence step: the content
    /// is already on disk, this only recomputes and republishes `active`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::KernelPublishFailed`] on a hard kernel-shim
    /// failure, in which case the in-memory file layer is left unchanged.
    pub async fn update_file_rules(&self, policy_set: PolicySet, http_rewrites: Vec<HttpRewriteRule>, cedar: String) -> PolicyResult<Snapshot> {
        self.try_publish(|store| {
            store.set_file_layer(Layer { policy_set, http_rewrites, cedar });
        })
        .await
    }

    /// `SetRuntimeRules` operation (spec.md §4.3), used by
    /// `POST /api/policies` and `PATCH /api/policies`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::KernelPublishFailed`] on a hard kernel-shim
    /// failure.
    pub async fn set_runtime_rules(&self, policy_set: PolicySet, http_rewrites: Vec<HttpRewriteRule>, cedar: String) -> PolicyResult<Snapshot> {
        self.try_publish(|store| {
            store.set_runtime_overlay(Layer { policy_set, http_rewrites, cedar });
        })
        .await
    }

    /// `SetRuntimeOnly` operation (spec.md §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::KernelPublishFailed`] on a hard kernel-shim
    /// failure.
    pub async fn set_runtime_only(&self, runtime_only: bool) -> PolicyResult<Snapshot> {
        self.try_publish(|store| store.set_runtime_only(runtime_only)).await
    }

    /// `POST /api/policies/permit-all` (spec.md §4.9).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::KernelPublishFailed`] on a hard kernel-shim
    /// failure.
    pub async fn permit_all(&self) -> PolicyResult<Snapshot> {
        self.try_publish(PolicyStore::enable_permit_all).await
    }

    /// `POST /api/policies/enforce-apply` (spec.md §4.9): clears the
    /// runtime overlay and returns to `enforce` mode.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::KernelPublishFailed`] on a hard kernel-shim
    /// failure.
    pub async fn enforce_apply(&self) -> PolicyResult<Snapshot> {
        self.try_publish(PolicyStore::enforce_apply).await
    }

    /// `POST /api/policies/persist` (spec.md §4.9): compile `cedar`,
    /// reject if it compiles to zero rules (unless `force`), reject if it
    /// would remove every connect-allow rule (unless `force`), then write
    /// it to the canonical file under an fsync+rename discipline and
    /// promote it to the file layer.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::EmptyProgram`] or
    /// [`PolicyError::RemovesAllConnectAllows`] when the safety checks
    /// reject the candidate and `force` is false; [`PolicyError::TempWriteFailed`]
    /// or [`PolicyError::PersistFailed`] on I/O failure; or
    /// [`PolicyError::KernelPublishFailed`] on a hard kernel-shim failure.
    pub async fn persist_runtime_to_file(&self, cedar: &str, force: bool) -> PolicyResult<Snapshot> {
        let compiled = compile(cedar, "cedar-runtime.cedar").map_err(|err| match err {
            leash_dsl::ParseError::Syntax(detail) => PolicyError::CompileFailed(detail),
            leash_dsl::ParseError::EmptyProgram => PolicyError::EmptyProgram,
        })?;
        if compiled.policy_set.is_empty() && !force {
            return Err(PolicyError::EmptyProgram);
        }
        if !compiled.policy_set.has_connect_allow() && !force {
            return Err(PolicyError::RemovesAllConnectAllows);
        }

        self.write_canonical_file(cedar).await?;

        let result = self
            .try_publish(|store| {
                store.set_file_layer(Layer {
                    policy_set: compiled.policy_set.clone(),
                    http_rewrites: compiled.http_rewrites.clone(),
                    cedar: cedar.to_string(),
                });
            })
            .await;

        if result.is_ok() {
            self.logger.emit(Event::new("policy.update").field("source", "persist")).await;
        }
        result
    }

    /// Write `content` to the canonical policy file via the sibling
    /// tempfile + fsync + rename discipline (spec.md §4.3). On rename
    /// failure the previous on-disk file is left intact.
    async fn write_canonical_file(&self, content: &str) -> PolicyResult<()> {
        let path = self.policy_path.clone();
        let content = content.to_string();
        tokio::task::spawn_blocking(move || write_canonical_file_blocking(&path, &content))
            .await
            .expect("blocking persist task panicked")
    }

    /// Compute the candidate `active` snapshot under `mutate`, install it in
    /// the kernel shim, classify any failure, and either commit or roll
    /// back. Soft failures commit and are logged; hard failures roll back
    /// and are returned as [`PolicyError::KernelPublishFailed`].
    async fn try_publish(&self, mutate: impl FnOnce(&mut PolicyStore)) -> PolicyResult<Snapshot> {
        let mut store = self.store.lock().await;
        let mut candidate = store.clone();
        mutate(&mut candidate);

        let active = candidate.active();
        let tables = RuleTables::from(&active);
        if let Err(err) = self.kernel.install(&tables).await {
            match err.classify() {
                ShimErrorClass::Soft => {
                    self.logger
                        .emit(Event::new("lsm.start").field("status", "skipped").field("reason", err.to_string()))
                        .await;
                }
                ShimErrorClass::Hard => {
                    return Err(PolicyError::KernelPublishFailed(err.to_string()));
                }
            }
        }

        *store = candidate;
        let published = PublishedSnapshot { policy_set: store.active(), http_rewrites: store.active_http() };
        let snapshot = store.snapshot();
        drop(store);

        // Broadcast after the transaction commits (spec.md §5).
        let _ = self.snapshot_tx.send(published);
        self.logger.emit(Event::new("policy.update").field("source", "runtime")).await;
        Ok(snapshot)
    }
}

fn write_canonical_file_blocking(path: &Path, content: &str) -> PolicyResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| PolicyError::TempWriteFailed { dir: dir.to_path_buf(), source })?;
    tmp.write_all(content.as_bytes()).map_err(|source| PolicyError::TempWriteFailed { dir: dir.to_path_buf(), source })?;
    tmp.as_file().sync_all().map_err(|source| PolicyError::TempWriteFailed { dir: dir.to_path_buf(), source })?;
    tmp.persist(path).map_err(|e| PolicyError::PersistFailed { path: path.to_path_buf(), source: e.error })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_kernel::NullShim;
    use leash_log::Logger;

    async fn manager_with_null_shim() -> (PolicyManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (logger, _task) = Logger::spawn(dir.path().join("events.log"), 10).await.unwrap();
        let (manager, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger, dir.path().join("policy.cedar"));
        (manager, dir)
    }

    #[tokio::test]
    async fn soft_kernel_failure_still_commits_runtime_rules() {
        let (manager, _dir) = manager_with_null_shim().await;
        let snapshot = manager.set_runtime_rules(PolicySet::empty(), vec![], String::new()).await.unwrap();
        assert!(snapshot.active.is_empty());
    }

    #[tokio::test]
    async fn persist_writes_canonical_file_and_updates_file_layer() {
        let (manager, _dir) = manager_with_null_shim().await;
        let cedar = r#"permit (principal, action == Action::"Exec", resource) when { resource in [File::"/usr/bin/git"] };
permit (principal, action == Action::"NetConnect", resource);"#;
        let snapshot = manager.persist_runtime_to_file(cedar, false).await.unwrap();
        assert_eq!(snapshot.file.exec.len(), 1);

        let on_disk = tokio::fs::read_to_string(manager.policy_path()).await.unwrap();
        assert_eq!(on_disk, cedar);
    }

    #[tokio::test]
    async fn persist_rejects_removing_all_connect_allows_without_force() {
        let (manager, _dir) = manager_with_null_shim().await;
        let cedar = r#"permit (principal, action == Action::"Exec", resource) when { resource in [File::"/usr/bin/git"] };
forbid (principal, action == Action::"NetConnect", resource);"#;
        let err = manager.persist_runtime_to_file(cedar, false).await.unwrap_err();
        assert!(matches!(err, PolicyError::RemovesAllConnectAllows));
    }
}
