//! The policy watcher (C5): watches the canonical policy file, coalesces
//! bursts into a single debounced reload, and republishes on every change
//! (spec.md §4.4).

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::manager::PolicyManager;

/// Default quiet interval the watcher waits for a burst of filesystem
/// events to settle before reloading (spec.md §4.4).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Spawn the watcher task for `path` against `manager`. `on_ready_change` is
/// invoked with `false` whenever a reload's compile fails and `true` on a
/// successful reload, letting the caller drive the cross-cutting
/// `policy_ready` flag (spec.md §4.10) without this crate depending on the
/// bootstrap coordinator.
///
/// Returns the watcher task handle and the live [`RecommendedWatcher`] guard
/// (drop it to stop watching).
///
/// # Errors
///
/// Returns a [`notify::Error`] if the underlying OS watch cannot be
/// installed.
pub fn spawn(
    manager: std::sync::Arc<PolicyManager>,
    path: impl Into<PathBuf>,
    debounce: Duration,
    on_ready_change: impl Fn(bool) + Send + 'static,
) -> Result<(JoinHandle<()>, RecommendedWatcher), notify::Error> {
    let path = path.into();
    let (tx, mut rx) = mpsc::channel::<()>(16);

    let watch_path = path.clone();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<NotifyEvent, notify::Error>| match result {
            Ok(event) => {
                if event.paths.iter().any(|p| p == &watch_path) {
                    let _ = tx.blocking_send(());
                }
            }
            Err(err) => warn!(error = %err, "leash-policy: watcher error"),
        },
        Config::default(),
    )?;

    let watch_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    let handle = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // Drain any additional events that arrive within the debounce
            // window so a burst collapses into a single reload.
            loop {
                match tokio::time::timeout(debounce, rx.recv()).await {
                    Ok(Some(())) => continue,
                    _ => break,
                }
            }
            reload(&manager, &path, &on_ready_change).await;
        }
    });

    Ok((handle, watcher))
}

async fn reload(manager: &PolicyManager, path: &Path, on_ready_change: &impl Fn(bool)) {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "leash-policy: failed to read policy file on reload");
            on_ready_change(false);
            return;
        }
    };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("policy").to_string();
    match leash_dsl::compile(&content, &file_name) {
        Ok(compiled) => {
            if let Err(err) = manager.update_file_rules(compiled.policy_set, compiled.http_rewrites, content).await {
                warn!(error = %err, "leash-policy: publish failed on reload");
                on_ready_change(false);
                return;
            }
            debug!("leash-policy: reloaded policy file");
            on_ready_change(true);
        }
        Err(err) => {
            warn!(error = %err, "leash-policy: compile failed on reload");
            on_ready_change(false);
        }
    }
}
