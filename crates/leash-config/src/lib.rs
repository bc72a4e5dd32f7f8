//! Leash Config - environment-variable configuration for the manager
//! runtime (spec.md §6). File-based configuration is explicitly out of
//! scope; every setting here is resolved from `LEASH_*` environment
//! variables with the defaults spec.md names.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod env;
mod error;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use types::{Config, DEFAULT_BOOTSTRAP_TIMEOUT, DEFAULT_PROXY_PORT};

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a set variable cannot be
    /// parsed.
    pub fn load() -> ConfigResult<Config> {
        env::load()
    }
}
