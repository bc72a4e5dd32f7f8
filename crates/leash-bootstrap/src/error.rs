//! Bootstrap coordinator error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while constructing or running the bootstrap coordinator.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The "ready" sentinel file could not be written at startup.
    #[error("failed to write ready sentinel {path}: {source}")]
    ReadySentinelFailed {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
