//! The `bootstrap.ready` marker the target container's entrypoint writes,
//! and the staleness fingerprint used to detect a fresh one (spec.md §4.8,
//! §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{pid, hostname, timestamp}` as written by the target side (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapMarker {
    /// The target process's pid.
    pub pid: i64,
    /// The target container's hostname.
    pub hostname: String,
    /// When the target side became live.
    pub timestamp: DateTime<Utc>,
}

/// A fingerprint of the marker file's on-disk content, used to distinguish
/// a pre-existing (stale) marker from a freshly written one. Content-based
/// rather than mtime-based, since mtime resolution and clock skew across
/// containers make a pure mtime comparison unreliable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFingerprint(String);

impl MarkerFingerprint {
    /// Fingerprint raw marker file bytes.
    #[must_use]
    pub fn of(content: &str) -> Self {
        Self(content.to_string())
    }
}

/// Read and fingerprint the marker file at `path`, if it exists.
///
/// # Errors
///
/// Returns an I/O error for any failure other than the file not existing.
pub async fn read_marker(path: &std::path::Path) -> std::io::Result<Option<(BootstrapMarker, MarkerFingerprint)>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let fingerprint = MarkerFingerprint::of(&content);
            match serde_json::from_str::<BootstrapMarker>(&content) {
                Ok(marker) => Ok(Some((marker, fingerprint))),
                Err(_) => Ok(None),
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
