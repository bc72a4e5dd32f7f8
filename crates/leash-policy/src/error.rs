//! Policy manager error types.

use std::path::PathBuf;

use leash_dsl::ErrorDetail;
use thiserror::Error;

/// Errors surfaced by [`crate::PolicyManager`] operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The candidate source failed to lex or parse.
    #[error("policy source failed to compile: {0}")]
    CompileFailed(ErrorDetail),

    /// The candidate source compiled to zero rules, and the caller requires
    /// a non-empty program (spec.md §4.9: "if it produces zero rules, the
    /// PATCH is rejected with 400").
    #[error("policy source compiled to zero rules")]
    EmptyProgram,

    /// Accepting the candidate would remove every connect-allow rule
    /// without an explicit `force` override (spec.md §4.9).
    #[error("candidate policy removes all network-connect allows; pass force=true")]
    RemovesAllConnectAllows,

    /// The sibling tempfile could not be written.
    #[error("failed to write policy tempfile in {dir}: {source}")]
    TempWriteFailed {
        /// Directory the tempfile was created in.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The atomic rename from tempfile to the canonical path failed.
    #[error("failed to persist policy to {path}: {source}")]
    PersistFailed {
        /// Canonical destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The canonical policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    ReadFailed {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A hard kernel-shim failure occurred during publish; the attempted
    /// change has been rolled back (spec.md §4.3, §4.11).
    #[error("kernel shim publish failed: {0}")]
    KernelPublishFailed(String),
}

/// Convenience result alias for [`PolicyError`].
pub type PolicyResult<T> = Result<T, PolicyError>;
