//! The logger sink: a single writer task fed by a bounded, back-pressured
//! channel (spec.md §5: "Logger sink — single writer task behind an
//! unbounded-but-back-pressured channel").

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::event::Event;
use crate::ring::RingBuffer;

/// Capacity of the logger's inbound channel. Large enough that ordinary
/// bursts never block a publisher, but bounded so a genuinely stuck writer
/// eventually back-pressures producers instead of growing without limit.
const CHANNEL_CAPACITY: usize = 10_000;

/// Errors returned while constructing a [`Logger`].
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The log file could not be opened for appending.
    #[error("failed to open event log {path}: {source}")]
    OpenFailed {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A cheaply cloneable handle used by producers to emit events and by the
/// control plane to subscribe to the live stream or read a replay snapshot.
#[derive(Clone)]
pub struct LoggerHandle {
    sender: mpsc::Sender<Event>,
    broadcast: broadcast::Sender<Event>,
    ring: Arc<RwLock<RingBuffer>>,
}

impl LoggerHandle {
    /// Emit an event. Awaits if the channel is momentarily full, applying
    /// backpressure to the caller rather than dropping the event.
    pub async fn emit(&self, event: Event) {
        if self.sender.send(event).await.is_err() {
            // Writer task has shut down (e.g. during drain); drop silently,
            // matching §5's cancellation semantics (logger flushes then
            // stops accepting new work).
            warn!("leash-log: writer task gone, event dropped");
        }
    }

    /// Subscribe to the live event stream going forward.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcast.subscribe()
    }

    /// Snapshot the replay ring buffer (oldest first).
    pub async fn snapshot(&self) -> Vec<Event> {
        self.ring.read().await.snapshot()
    }
}

/// Owns the event log file and ring buffer; run via [`Logger::run`] as one
/// of the five long-lived tasks in spec.md §5.
pub struct Logger {
    receiver: mpsc::Receiver<Event>,
    file: tokio::fs::File,
    ring: Arc<RwLock<RingBuffer>>,
}

impl Logger {
    /// Open `path` for appending and construct a logger plus its handle.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::OpenFailed`] if the file cannot be opened.
    pub async fn spawn(path: impl Into<PathBuf>, ring_capacity: usize) -> Result<(LoggerHandle, JoinHandle<()>), LoggerError> {
        let path = path.into();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LoggerError::OpenFailed { path: path.clone(), source })?;

        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (broadcast_tx, _rx) = broadcast::channel(CHANNEL_CAPACITY.min(4096));
        let ring = Arc::new(RwLock::new(RingBuffer::new(ring_capacity)));

        let handle = LoggerHandle { sender, broadcast: broadcast_tx.clone(), ring: ring.clone() };
        let logger = Logger { receiver, file, ring };

        let task = tokio::spawn(logger.run(broadcast_tx));
        Ok((handle, task))
    }

    async fn run(mut self, broadcast_tx: broadcast::Sender<Event>) {
        while let Some(event) = self.receiver.recv().await {
            let line = event.to_line();
            if let Err(err) = self.file.write_all(line.as_bytes()).await {
                error!(error = %err, "leash-log: failed to write event line");
            } else if let Err(err) = self.file.write_all(b"\n").await {
                error!(error = %err, "leash-log: failed to write newline");
            } else if let Err(err) = self.file.flush().await {
                error!(error = %err, "leash-log: failed to flush event log");
            }

            self.ring.write().await.push(event.clone());
            // No receivers is the common case (no WS clients connected yet);
            // that is not an error.
            let _ = broadcast_tx.send(event);
        }
        let _ = self.file.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_events_to_file_and_ring_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let (handle, _task) = Logger::spawn(&path, 10).await.unwrap();

        handle.emit(Event::new("policy.update").field("source", "file")).await;

        // Give the writer task a moment to process.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("event=policy.update"));
        assert!(contents.contains("source=file"));

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_live_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let (handle, _task) = Logger::spawn(&path, 10).await.unwrap();

        let mut rx = handle.subscribe();
        handle.emit(Event::new("http.request")).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name, "http.request");
    }
}
