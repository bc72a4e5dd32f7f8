//! Rule-model error types.

use thiserror::Error;

/// Errors that can occur while constructing or composing rule tables.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A hostname or path field exceeded the bounded buffer capacity and had
    /// to be rejected outright (used only where truncation would silently
    /// change matching semantics, e.g. exact-match path rules).
    #[error("field '{field}' exceeds maximum length {max} bytes")]
    FieldTooLong {
        /// Name of the offending field.
        field: String,
        /// Maximum permitted length.
        max: usize,
    },

    /// A connect rule specified neither a hostname, a destination IP, nor
    /// the wildcard flag, leaving it unable to ever match.
    #[error("connect rule has no matchable target (hostname, dest_ip, or wildcard)")]
    UnmatchableConnectRule,
}

/// Convenience result alias for [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
