//! Configuration error types.

use thiserror::Error;

/// Errors returned while loading [`crate::Config`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed as
    /// the expected type.
    #[error("environment variable {var} has invalid value {value:?}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: &'static str,
        /// The offending raw value.
        value: String,
        /// Why it could not be parsed.
        reason: String,
    },
}

/// Convenience result alias for [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
