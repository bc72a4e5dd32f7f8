//! Secret vault error types.

use thiserror::Error;

/// Errors returned by [`crate::SecretVault`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// A secret with this id already exists with a different value.
    #[error("secret '{0}' already exists with a different value")]
    Conflict(String),

    /// No secret exists with this id.
    #[error("secret '{0}' not found")]
    NotFound(String),
}

/// Convenience result alias for [`VaultError`].
pub type VaultResult<T> = Result<T, VaultError>;
