//! Kernel-shim error types and the soft/hard failure classification.

use thiserror::Error;

/// An error returned by a [`crate::KernelShim`] implementation while
/// installing rule tables.
#[derive(Debug, Error, Clone)]
pub enum ShimError {
    /// The kernel enforcement program is not available on this platform
    /// (e.g. running on non-Linux, or the BPF program was never loaded).
    #[error("kernel enforcement program unavailable: {0}")]
    Unavailable(String),

    /// The calling process lacks permission to install rule tables
    /// (`EPERM`) or the shim's file descriptor is invalid (`EBADF`).
    #[error("permission denied installing kernel rules: {0}")]
    PermissionDenied(String),

    /// BPF support is compiled out or the running kernel lacks it.
    #[error("BPF not supported on this kernel: {0}")]
    BpfNotSupported(String),

    /// Any other, unanticipated failure. Treated as hard by default.
    #[error("kernel shim error: {0}")]
    Other(String),
}

/// Whether a [`ShimError`] should be tolerated (soft) or should roll back
/// the attempted publish (hard), per spec.md §4.3/§4.11.
///
/// `[SUPPLEMENT]` per SPEC_FULL.md §9 / spec.md's open questions, this
/// classification is a typed match rather than a substring match on an
/// error message, replacing the reference implementation's string-keyed
/// approach the way the Open Questions ask an implementer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimErrorClass {
    /// Tolerated: the runtime continues in degraded (unenforced) mode.
    Soft,
    /// Unrecoverable: the attempted publish is rolled back.
    Hard,
}

impl ShimError {
    /// Classify this error as soft or hard.
    #[must_use]
    pub fn classify(&self) -> ShimErrorClass {
        match self {
            ShimError::Unavailable(_) | ShimError::PermissionDenied(_) | ShimError::BpfNotSupported(_) => {
                ShimErrorClass::Soft
            }
            ShimError::Other(_) => ShimErrorClass::Hard,
        }
    }
}
