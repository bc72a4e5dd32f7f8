//! The `/api` WebSocket endpoint: one connection per client, carrying both
//! forwarded audit events and `policy.snapshot` broadcasts (spec.md §4.9).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;

use crate::lines::{render_active_lines, snapshot_dto};
use crate::state::{AppState, WsEnvelope};

/// `GET /api`: upgrade to a WebSocket and hand the connection to
/// [`handle_socket`].
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Send the current snapshot immediately on connect, then forward every
/// envelope the hub publishes until the client disconnects or falls far
/// enough behind to be dropped (spec.md §5: "slow consumers are
/// disconnected").
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let initial = {
        let snapshot = state.policy.snapshot().await;
        let lines = render_active_lines(&snapshot);
        let dto = snapshot_dto(&snapshot, state.readiness.is_ready());
        WsEnvelope::PolicySnapshot { snapshot: dto, lines }
    };
    if send_envelope(&mut socket, &initial).await.is_err() {
        return;
    }

    let mut rx = state.hub.subscribe();
    loop {
        tokio::select! {
            envelope = rx.recv() => {
                match envelope {
                    Ok(envelope) => {
                        if send_envelope(&mut socket, &envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Client fell behind the bounded queue; disconnect
                        // rather than replay a gap (spec.md §5).
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

async fn send_envelope(socket: &mut WebSocket, envelope: &WsEnvelope) -> Result<(), axum::Error> {
    let text = serde_json::to_string(envelope).expect("WsEnvelope serialization is infallible");
    socket.send(Message::Text(text.into())).await
}
