//! The connect-decision gate: the first step of the per-connection pipeline
//! in spec.md §4.6, consulting the active [`PolicySet`] before any bytes
//! are forwarded or TLS is terminated.

use std::net::IpAddr;

use leash_core::{Action, PolicySet};

/// Resolve a connect decision for a `CONNECT`/direct-dial target.
///
/// `host` is the request's SNI or `Host:` hostname when known; `ip` is the
/// resolved destination address, packed as `u32` when it is IPv4 (matching
/// [`leash_core::ConnectRule`]'s representation — IPv6 destinations are
/// matched by hostname only, per DESIGN.md).
#[must_use]
pub fn check(policy: &PolicySet, host: Option<&str>, ip: Option<IpAddr>, port: u16) -> Action {
    let packed_ip = match ip {
        Some(IpAddr::V4(v4)) => Some(u32::from(v4)),
        _ => None,
    };
    policy.check_connect(host, packed_ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_core::ConnectRule;

    #[test]
    fn denies_by_default_with_no_matching_rule() {
        let policy = PolicySet::empty();
        assert_eq!(check(&policy, Some("api.example.com"), None, 443), Action::Deny);
    }

    #[test]
    fn allows_when_a_connect_rule_matches_the_host() {
        let mut policy = PolicySet::empty();
        policy.connect.push(ConnectRule::new(Action::Allow, Some("api.example.com"), None, None, false).unwrap());
        assert_eq!(check(&policy, Some("api.example.com"), None, 443), Action::Allow);
        assert_eq!(check(&policy, Some("other.example.com"), None, 443), Action::Deny);
    }

    #[test]
    fn matches_ipv4_destinations_by_packed_address() {
        let mut policy = PolicySet::empty();
        policy.connect.push(ConnectRule::new(Action::Allow, None, Some(0x7f00_0001), None, false).unwrap());
        let ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(check(&policy, None, Some(ip), 22), Action::Allow);
    }
}
