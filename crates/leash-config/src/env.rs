//! Loads [`Config`] from environment variables, applying the defaults
//! spec.md §6 specifies for each one.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, DEFAULT_BOOTSTRAP_TIMEOUT, DEFAULT_PROXY_PORT};

/// Load [`Config`] from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if a set variable cannot be parsed
/// (`LEASH_PROXY_PORT` as a port number, `LEASH_BOOTSTRAP_TIMEOUT` as a
/// duration).
pub fn load() -> ConfigResult<Config> {
    let shared_dir = path_var("LEASH_DIR", PathBuf::from("/run/leash"));
    let private_dir = path_var("LEASH_PRIVATE_DIR", PathBuf::from("/run/leash-private"));
    let policy_path = path_var("LEASH_POLICY", shared_dir.join("policy.cedar"));
    let log_path = path_var("LEASH_LOG", shared_dir.join("events.log"));
    let listen = non_blank_var("LEASH_LISTEN");
    let proxy_port = port_var("LEASH_PROXY_PORT", DEFAULT_PROXY_PORT)?;
    let cgroup_path = non_blank_var("LEASH_CGROUP_PATH").map(PathBuf::from);
    let bootstrap_timeout = duration_var("LEASH_BOOTSTRAP_TIMEOUT", DEFAULT_BOOTSTRAP_TIMEOUT)?;
    let allow_lsm_failure = truthy_var("LEASH_ALLOW_LSM_FAILURE");

    Ok(Config {
        shared_dir,
        private_dir,
        policy_path,
        log_path,
        listen,
        proxy_port,
        cgroup_path,
        bootstrap_timeout,
        allow_lsm_failure,
    })
}

fn non_blank_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn path_var(name: &'static str, default: PathBuf) -> PathBuf {
    non_blank_var(name).map(PathBuf::from).unwrap_or(default)
}

fn truthy_var(name: &str) -> bool {
    match non_blank_var(name) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => false,
    }
}

fn port_var(name: &'static str, default: u16) -> ConfigResult<u16> {
    match non_blank_var(name) {
        Some(value) => value.parse::<u16>().map_err(|e| ConfigError::InvalidValue { var: name, value, reason: e.to_string() }),
        None => Ok(default),
    }
}

/// Parse a Go-style duration string (`"2m"`, `"30s"`, `"1h"`) or a bare
/// integer number of seconds.
fn duration_var(name: &'static str, default: Duration) -> ConfigResult<Duration> {
    let Some(value) = non_blank_var(name) else {
        return Ok(default);
    };
    parse_duration(&value).ok_or_else(|| ConfigError::InvalidValue {
        var: name,
        value: value.clone(),
        reason: "expected a number of seconds or a suffixed duration like \"2m\", \"30s\", \"1h\"".to_string(),
    })
}

fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let (digits, unit) = value.split_at(value.len().checked_sub(1)?);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("bogus"), None);
    }

    #[test]
    fn truthy_values_are_case_insensitive() {
        std::env::remove_var("LEASH_TEST_TRUTHY_UNSET");
        assert!(!truthy_var("LEASH_TEST_TRUTHY_UNSET"));
    }
}
