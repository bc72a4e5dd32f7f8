//! MITM proxy error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while constructing or operating the MITM proxy's CA.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The CA certificate or key could not be generated.
    #[error("failed to generate CA: {0}")]
    CaGenerationFailed(String),

    /// The CA cert/key could not be written to disk.
    #[error("failed to persist CA material to {path}: {source}")]
    CaPersistFailed {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CA cert/key on disk could not be parsed.
    #[error("failed to load CA material from {path}: {reason}")]
    CaLoadFailed {
        /// Path that failed to parse.
        path: PathBuf,
        /// Why parsing failed.
        reason: String,
    },

    /// Leaf certificate issuance for a given SNI/host failed.
    #[error("failed to mint leaf certificate for {host}: {reason}")]
    LeafIssuanceFailed {
        /// The host the certificate was requested for.
        host: String,
        /// Why issuance failed.
        reason: String,
    },
}

/// Convenience result alias for [`ProxyError`].
pub type ProxyResult<T> = Result<T, ProxyError>;
