//! The [`KernelShim`] trait: the contract the runtime holds with the
//! in-kernel enforcement program (spec.md §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ShimError;
use crate::tables::RuleTables;

/// Decision recorded in an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation was permitted.
    Allowed,
    /// The operation was denied.
    Denied,
}

/// A single kernel-originated audit event: `(timestamp, operation,
/// process-identity, path/hostname/addr, decision)` per spec.md §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the kernel made the decision.
    pub timestamp: DateTime<Utc>,
    /// Operation tag (`open`, `exec`, `connect`).
    pub operation: String,
    /// Best-effort identity of the process that attempted the operation
    /// (e.g. `pid:cmdline`).
    pub process_identity: String,
    /// The path, hostname, or address the operation targeted.
    pub target: String,
    /// What the kernel decided.
    pub decision: AuditOutcome,
}

/// Client-side contract with the in-kernel enforcement program.
///
/// Implementations marshal [`RuleTables`] into the kernel's expected layout
/// and re-upload on every `install` call; they also surface the kernel's
/// audit event stream via [`KernelShim::subscribe`]. The kernel program's
/// own BPF/LSM code is out of scope for this crate.
#[async_trait]
pub trait KernelShim: Send + Sync {
    /// Install (replace) the active rule tables in the kernel.
    ///
    /// # Errors
    ///
    /// Returns a [`ShimError`], which the caller classifies as soft or hard
    /// via [`ShimError::classify`].
    async fn install(&self, tables: &RuleTables) -> Result<(), ShimError>;

    /// Subscribe to the kernel's audit event stream.
    fn subscribe(&self) -> broadcast::Receiver<AuditEvent>;
}

/// A shim that always reports the kernel enforcement program as
/// unavailable — the soft-fail default used on platforms without the LSM
/// (e.g. non-Linux, or when `LEASH_ALLOW_LSM_FAILURE` degrades a failed
/// real shim to this behavior).
pub struct NullShim {
    events: broadcast::Sender<AuditEvent>,
}

impl NullShim {
    /// Construct a new null shim.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        Self { events }
    }
}

impl Default for NullShim {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KernelShim for NullShim {
    async fn install(&self, _tables: &RuleTables) -> Result<(), ShimError> {
        Err(ShimError::Unavailable("no kernel enforcement program loaded".to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_shim_reports_soft_failure() {
        let shim = NullShim::new();
        let err = shim.install(&RuleTables::default()).await.unwrap_err();
        assert_eq!(err.classify(), crate::error::ShimErrorClass::Soft);
    }
}
