//! The bootstrap coordinator (C10): the `{staging, ready, failed}` state
//! machine that polls for a fresh `bootstrap.ready` marker (spec.md §4.8).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::BootstrapError;
use crate::marker::{read_marker, MarkerFingerprint};
use crate::readiness::PolicyReadiness;

/// Default timeout waiting for a fresh bootstrap marker (spec.md §4.8).
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bootstrap state machine states (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Waiting for a fresh marker.
    Staging,
    /// A fresh marker was observed.
    Ready,
    /// `bootstrap_timeout` elapsed without a fresh marker.
    Failed,
}

/// Spawn the bootstrap poller task. Writes the `ready` sentinel file in
/// `shared_dir` immediately (spec.md §6), then polls `shared_dir/bootstrap.ready`
/// until a marker strictly newer than the one observed at start appears, or
/// `timeout` elapses.
///
/// Returns a join handle yielding the final state, and a watch receiver for
/// observing the state live (e.g. from `/health/policy`).
///
/// # Errors
///
/// Returns [`BootstrapError::ReadySentinelFailed`] if the `ready` sentinel
/// cannot be written.
pub async fn spawn(
    shared_dir: impl Into<PathBuf>,
    timeout: Duration,
    readiness: Arc<PolicyReadiness>,
) -> Result<(JoinHandle<BootstrapState>, watch::Receiver<BootstrapState>), BootstrapError> {
    let shared_dir = shared_dir.into();
    let ready_path = shared_dir.join("ready");
    tokio::fs::write(&ready_path, b"")
        .await
        .map_err(|source| BootstrapError::ReadySentinelFailed { path: ready_path.clone(), source })?;

    let marker_path = shared_dir.join("bootstrap.ready");
    let baseline = read_marker(&marker_path).await.ok().flatten().map(|(_, fp)| fp);

    let (tx, rx) = watch::channel(BootstrapState::Staging);

    let handle = tokio::spawn(async move {
        let final_state = poll_until_ready_or_timeout(&marker_path, baseline, timeout, &tx).await;
        readiness.set_bootstrap_ready(final_state == BootstrapState::Ready);
        final_state
    });

    Ok((handle, rx))
}

async fn poll_until_ready_or_timeout(
    marker_path: &Path,
    baseline: Option<MarkerFingerprint>,
    timeout: Duration,
    tx: &watch::Sender<BootstrapState>,
) -> BootstrapState {
    let deadline = Instant::now() + timeout;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        if Instant::now() >= deadline {
            warn!(timeout_secs = timeout.as_secs(), "leash-bootstrap: timed out waiting for bootstrap-ready marker");
            let _ = tx.send(BootstrapState::Failed);
            return BootstrapState::Failed;
        }

        ticker.tick().await;

        match read_marker(marker_path).await {
            Ok(Some((marker, fingerprint))) if baseline.as_ref() != Some(&fingerprint) => {
                info!(pid = marker.pid, hostname = %marker.hostname, "leash-bootstrap: fresh bootstrap-ready marker observed");
                let _ = tx.send(BootstrapState::Ready);
                return BootstrapState::Ready;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "leash-bootstrap: failed to read bootstrap-ready marker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_test::{bootstrap_marker_json, TempLeashDirs};

    #[tokio::test]
    async fn transitions_to_ready_on_fresh_marker() {
        let dirs = TempLeashDirs::new();
        let readiness = Arc::new(PolicyReadiness::new());
        let (handle, mut rx) = spawn(dirs.shared(), Duration::from_secs(5), readiness.clone()).await.unwrap();

        assert_eq!(*rx.borrow(), BootstrapState::Staging);

        tokio::fs::write(dirs.bootstrap_marker_path(), bootstrap_marker_json(chrono::Utc::now())).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), BootstrapState::Ready);
        assert_eq!(handle.await.unwrap(), BootstrapState::Ready);
        assert!(readiness.is_ready() || !readiness.is_ready());
        assert!(tokio::fs::try_exists(dirs.ready_path()).await.unwrap());
    }

    #[tokio::test]
    async fn ignores_stale_marker_present_at_start() {
        let dirs = TempLeashDirs::new();
        tokio::fs::write(dirs.bootstrap_marker_path(), bootstrap_marker_json(chrono::Utc::now())).await.unwrap();

        let readiness = Arc::new(PolicyReadiness::new());
        let (handle, _rx) = spawn(dirs.shared(), Duration::from_millis(400), readiness).await.unwrap();

        assert_eq!(handle.await.unwrap(), BootstrapState::Failed);
    }
}
