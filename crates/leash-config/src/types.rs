//! The [`Config`] type: every environment variable the runtime consumes
//! (spec.md §6), resolved to typed fields with defaults applied.

use std::path::PathBuf;
use std::time::Duration;

/// Default MITM proxy listen port (spec.md §6).
pub const DEFAULT_PROXY_PORT: u16 = 18000;

/// Default bootstrap timeout (spec.md §6, §4.8).
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `LEASH_DIR` - the shared (world-readable) directory.
    pub shared_dir: PathBuf,
    /// `LEASH_PRIVATE_DIR` - the private (0700) directory.
    pub private_dir: PathBuf,
    /// `LEASH_POLICY` - the canonical policy file path.
    pub policy_path: PathBuf,
    /// `LEASH_LOG` - the event log file path.
    pub log_path: PathBuf,
    /// `LEASH_LISTEN` - the control plane bind address. `None` disables it.
    pub listen: Option<String>,
    /// `LEASH_PROXY_PORT` - the MITM proxy's listen port.
    pub proxy_port: u16,
    /// `LEASH_CGROUP_PATH` - the target's resolved cgroup path, if set.
    pub cgroup_path: Option<PathBuf>,
    /// `LEASH_BOOTSTRAP_TIMEOUT` - how long to wait for a fresh bootstrap marker.
    pub bootstrap_timeout: Duration,
    /// `LEASH_ALLOW_LSM_FAILURE` - whether a failed kernel shim install
    /// degrades to soft-fail rather than being treated as hard.
    pub allow_lsm_failure: bool,
}
