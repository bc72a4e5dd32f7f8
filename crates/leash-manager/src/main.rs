//! `leash-manager` — the runtime binary that wires the policy manager (C4),
//! policy watcher (C5), kernel shim client (C6), MITM proxy (C7), secret
//! vault (C8), logger (C9), bootstrap coordinator (C10), and control plane
//! (C11) together (spec.md §2, §5, §6).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod filesystem;
mod shutdown;

use std::sync::Arc;

use leash_bootstrap::{BootstrapState, PolicyReadiness};
use leash_control::AppState;
use leash_kernel::NullShim;
use leash_log::{Event, Logger};
use leash_policy::PolicyManager;
use leash_proxy::{CertificateAuthority, ProxyHandles};
use leash_secrets::SecretVault;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Ring buffer capacity for event replay (spec.md §5: "default 10000").
const RING_BUFFER_CAPACITY: usize = 10_000;

/// Bounded LRU capacity for the proxy's minted-leaf-certificate cache.
const CERT_CACHE_CAPACITY: usize = 512;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,leash=info")))
        .init();

    let config = leash_config::Config::load()?;
    filesystem::prepare_directories(&config.shared_dir, &config.private_dir)?;

    let (logger, logger_task) = Logger::spawn(&config.log_path, RING_BUFFER_CAPACITY).await?;

    let (policy, policy_rx) = PolicyManager::new(Arc::new(NullShim::new()), logger.clone(), config.policy_path.clone());
    let policy = Arc::new(policy);

    let readiness = Arc::new(PolicyReadiness::new());
    readiness.set_file_compiled(load_initial_policy(&policy, &config.policy_path).await);

    let (bootstrap_handle, _bootstrap_state_rx) =
        leash_bootstrap::spawn(&config.shared_dir, config.bootstrap_timeout, readiness.clone()).await?;
    spawn_bootstrap_watchdog(bootstrap_handle);

    let (watcher_task, _watcher_guard) = leash_policy::spawn_watcher(policy.clone(), &config.policy_path, leash_policy::DEFAULT_DEBOUNCE, {
        let readiness = readiness.clone();
        move |ok| readiness.set_file_compiled(ok)
    })?;

    let ca = CertificateAuthority::load_or_generate(&config.shared_dir.join("ca-cert.pem"), &config.private_dir.join("ca-key.pem"))?;
    let secrets = Arc::new(SecretVault::new());
    let (proxy_state_tx, proxy_state_rx) = leash_proxy::state_channel();
    let proxy_handles = ProxyHandles::new(ca, secrets.clone(), logger.clone(), proxy_state_rx, CERT_CACHE_CAPACITY)?;
    let proxy_addr = format!("0.0.0.0:{}", config.proxy_port).parse()?;
    let proxy_task = leash_proxy::spawn(proxy_addr, proxy_handles).await?;

    let bridge_task = spawn_snapshot_bridge(policy_rx, proxy_state_tx);

    let hub = leash_control::EventsHub::new();
    let forwarder_task = leash_control::spawn_event_forwarder(logger.clone(), hub.clone());

    let control_task = match &config.listen {
        Some(listen) => {
            let app_state = Arc::new(AppState { policy: policy.clone(), secrets, logger: logger.clone(), readiness, hub });
            Some(spawn_control_plane(listen.clone(), app_state).await?)
        }
        None => {
            info!("leash-manager: LEASH_LISTEN unset, control plane disabled");
            None
        }
    };

    logger
        .emit(
            Event::new("manager.start")
                .field("proxy_port", config.proxy_port)
                .field("allow_lsm_failure", config.allow_lsm_failure)
                .maybe_field("cgroup_path", config.cgroup_path.as_ref().map(|p| p.display())),
        )
        .await;
    info!(proxy_port = config.proxy_port, shared_dir = %config.shared_dir.display(), "leash-manager: started");

    shutdown::wait_for_signal().await;
    info!("leash-manager: shutdown signal received, draining");

    if let Some(task) = control_task {
        task.abort();
    }
    proxy_task.abort();
    bridge_task.abort();
    forwarder_task.abort();
    watcher_task.abort();
    logger.emit(Event::new("manager.stop")).await;
    // Drop every remaining `LoggerHandle` clone so the writer task's mpsc
    // channel actually closes; otherwise `logger_task` awaits forever.
    drop(logger);
    drop(policy);
    let _ = logger_task.await;

    info!("leash-manager: stopped");
    Ok(())
}

/// Compile the on-disk policy file (if any) and publish it as the file
/// layer. A missing file is not an error — the runtime starts with an empty
/// file layer and relies on the runtime overlay or a later watcher reload.
/// Returns whether the policy side of `policy_ready` should start true
/// (spec.md §4.10: "initial on-disk source compiled successfully").
async fn load_initial_policy(policy: &PolicyManager, path: &std::path::Path) -> bool {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "leash-manager: no initial policy file, starting with an empty file layer");
            return false;
        }
    };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("policy").to_string();
    match leash_dsl::compile(&content, &file_name) {
        Ok(compiled) => match policy.update_file_rules(compiled.policy_set, compiled.http_rewrites, content).await {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "leash-manager: failed to publish initial policy");
                false
            }
        },
        Err(err) => {
            error!(error = %err, "leash-manager: initial policy file failed to compile");
            false
        }
    }
}

/// Await the bootstrap coordinator's final state; exit non-zero on timeout
/// (spec.md §4.11: "Bootstrap timeout: process exits with non-zero status").
fn spawn_bootstrap_watchdog(handle: tokio::task::JoinHandle<BootstrapState>) {
    tokio::spawn(async move {
        match handle.await {
            Ok(BootstrapState::Failed) => {
                error!("leash-manager: bootstrap timed out waiting for a fresh bootstrap-ready marker");
                std::process::exit(1);
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "leash-manager: bootstrap coordinator task panicked");
                std::process::exit(1);
            }
        }
    });
}

/// Bridge the policy manager's published-snapshot watch channel into the
/// proxy's own `ActiveState` channel, translating between the two types so
/// `leash-proxy` keeps no dependency on `leash-policy` (spec.md §9's
/// cyclic-reference redesign flag).
fn spawn_snapshot_bridge(
    mut policy_rx: tokio::sync::watch::Receiver<leash_policy::PublishedSnapshot>,
    proxy_tx: tokio::sync::watch::Sender<leash_proxy::ActiveState>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let published = policy_rx.borrow_and_update().clone();
            let _ = proxy_tx.send(leash_proxy::ActiveState {
                policy: published.policy_set,
                http_rewrites: published.http_rewrites,
            });
            if policy_rx.changed().await.is_err() {
                break;
            }
        }
    })
}

async fn spawn_control_plane(listen: String, state: Arc<AppState>) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let router = leash_control::build_router(state);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(listen = %listen, "leash-manager: control plane listening");
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!(error = %err, "leash-manager: control plane server exited with an error");
        }
    }))
}
