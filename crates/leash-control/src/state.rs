//! Shared application state handed to every handler, and the WebSocket
//! event hub every mutating endpoint broadcasts through (spec.md §4.9,
//! §5's "bounded per-client send queue; slow consumers are disconnected").

use std::sync::Arc;

use leash_bootstrap::PolicyReadiness;
use leash_log::{Event, LoggerHandle};
use leash_policy::PolicyManager;
use leash_secrets::SecretVault;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lines::{snapshot_dto, LineDto, PolicySnapshotDto};

/// Capacity of the per-client WebSocket broadcast queue. A client that
/// falls this far behind is disconnected rather than allowed to stall
/// publishers (spec.md §5).
pub const HUB_QUEUE_CAPACITY: usize = leash_log::DEFAULT_CLIENT_QUEUE_CAPACITY;

/// Everything handlers need: the policy manager, secret vault, logger,
/// cross-cutting readiness flag, and the WebSocket broadcast hub.
pub struct AppState {
    /// Policy manager (C4): owns the `PolicyStore` and publish transaction.
    pub policy: Arc<PolicyManager>,
    /// Secret vault (C8).
    pub secrets: Arc<SecretVault>,
    /// Structured event sink (C9).
    pub logger: LoggerHandle,
    /// Cross-cutting `policy_ready` flag (spec.md §4.10).
    pub readiness: Arc<PolicyReadiness>,
    /// WebSocket broadcast hub for `policy.snapshot` and forwarded events.
    pub hub: EventsHub,
}

/// A JSON envelope sent over the `/api` WebSocket, tagged by `type` so
/// clients can distinguish snapshots from forwarded audit events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WsEnvelope {
    /// A forwarded audit/diagnostic event from the logger (C9).
    #[serde(rename = "event")]
    Event {
        /// The event's name, e.g. `policy.update`, `http.request`.
        name: String,
        /// RFC3339 timestamp.
        timestamp: String,
        /// Ordered `key=value` fields.
        fields: Vec<(String, String)>,
    },
    /// The new policy snapshot following a successful mutating request.
    #[serde(rename = "policy.snapshot")]
    PolicySnapshot {
        /// The new snapshot.
        snapshot: PolicySnapshotDto,
        /// The snapshot's active program, re-rendered for the UI.
        lines: Vec<LineDto>,
    },
}

impl From<Event> for WsEnvelope {
    fn from(event: Event) -> Self {
        WsEnvelope::Event { name: event.name, timestamp: event.timestamp.to_rfc3339(), fields: event.fields }
    }
}

/// The broadcast hub: a thin wrapper so `AppState` stays `Clone` without
/// exposing the raw channel type to every call site.
#[derive(Clone)]
pub struct EventsHub {
    tx: broadcast::Sender<WsEnvelope>,
}

impl EventsHub {
    /// Construct a new hub with the default client queue capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(HUB_QUEUE_CAPACITY);
        Self { tx }
    }

    /// Subscribe a new WebSocket client.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WsEnvelope> {
        self.tx.subscribe()
    }

    /// Broadcast an envelope. No receivers connected is not an error.
    pub fn publish(&self, envelope: WsEnvelope) {
        let _ = self.tx.send(envelope);
    }
}

impl Default for EventsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch the current snapshot, render its lines, and broadcast it as a
/// `policy.snapshot` envelope. Called by every successful mutating endpoint
/// (spec.md §4.9: "every successful mutating endpoint broadcasts
/// `policy.snapshot`"), after the publish transaction has committed.
///
/// Also updates the policy side of `policy_ready` (spec.md §4.10) from the
/// runtime overlay's emptiness, so a manager driven entirely through
/// `POST`/`PATCH /api/policies` becomes ready on a valid overlay even if the
/// on-disk file layer never compiled.
pub async fn broadcast_snapshot(state: &AppState) {
    let snapshot = state.policy.snapshot().await;
    state.readiness.set_runtime_overlay_non_empty(!snapshot.runtime.is_empty());
    let lines = crate::lines::render_active_lines(&snapshot);
    let dto = snapshot_dto(&snapshot, state.readiness.is_ready());
    state.hub.publish(WsEnvelope::PolicySnapshot { snapshot: dto, lines });
}

/// Spawn the background task that forwards every event the logger emits
/// onto the WebSocket hub, so `/api` streams both audit events and policy
/// snapshots over one connection (spec.md §4.9, §2's data-flow summary).
#[must_use]
pub fn spawn_event_forwarder(logger: LoggerHandle, hub: EventsHub) -> JoinHandle<()> {
    let mut rx = logger.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => hub.publish(WsEnvelope::from(event)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
