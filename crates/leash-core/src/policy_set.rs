//! `PolicySet`: ordered sequences of Open/Exec/Connect/Mcp rules plus the
//! connect default flags, and the first-match-wins decision queries over
//! them (spec.md §3, §4.5).

use serde::{Deserialize, Serialize};

use crate::rule::{Action, ConnectRule, ExecRule, McpRule, OpenRule};

/// An ordered, composable rule table. Order is significant: the first
/// matching rule within a family decides (spec.md §3 "Order is significant").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Open rules, in statement order.
    pub open: Vec<OpenRule>,
    /// Exec rules, in statement order.
    pub exec: Vec<ExecRule>,
    /// Connect rules, in statement order.
    pub connect: Vec<ConnectRule>,
    /// MCP rules, in statement order.
    pub mcp: Vec<McpRule>,
    /// Whether the connect default was stated explicitly by the source.
    pub default_explicit: bool,
    /// Default connect decision when no connect rule matches.
    pub default_allow: bool,
}

impl PolicySet {
    /// An empty policy set with connect defaulting to deny (fail-closed),
    /// matching the kernel shim's "no match -> default deny" rule for
    /// open/exec (spec.md §4.5); connect's own default is a policy choice,
    /// so an empty set conservatively denies it too.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this set carries no rules at all — the condition spec.md
    /// §4.2 requires the compiler to report so the caller can decide
    /// whether to reject an empty program.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.exec.is_empty() && self.connect.is_empty() && self.mcp.is_empty()
    }

    /// Total rule count across all families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len() + self.exec.len() + self.connect.len() + self.mcp.len()
    }

    /// A policy set that allows every open, exec, connect, and MCP
    /// operation outright — the rule table published while the store is in
    /// `permit-all` mode (spec.md §4.9 `/api/policies/permit-all`; glossary:
    /// "a permissive overlay is active; the file layer is bypassed").
    #[must_use]
    pub fn permit_all() -> Self {
        Self {
            open: vec![OpenRule::new(Action::Allow, crate::Operation::Open, "/", true, crate::OpenMode::Any)],
            exec: vec![ExecRule::new(Action::Allow, "/", true)],
            connect: Vec::new(),
            mcp: vec![McpRule { action: Action::Allow, server: None, tool: None, is_wildcard: true }],
            default_explicit: true,
            default_allow: true,
        }
    }

    /// Whether this set has at least one connect rule with `action ==
    /// Allow`. Backs the "refusing to remove all network connect allows"
    /// safety check (spec.md §4.9, §4.11).
    #[must_use]
    pub fn has_connect_allow(&self) -> bool {
        self.connect.iter().any(|r| r.action == Action::Allow) || self.default_allow
    }

    /// Concatenate `self` (runtime, matched first) ahead of `file` (file
    /// layer), per the compose semantics in spec.md §4.3: "`active = runtime
    /// ⊕ file`, where ⊕ concatenates rule sequences with runtime first."
    #[must_use]
    pub fn compose_over(&self, file: &PolicySet) -> PolicySet {
        let mut open = self.open.clone();
        open.extend(file.open.iter().cloned());
        let mut exec = self.exec.clone();
        exec.extend(file.exec.iter().cloned());
        let mut connect = self.connect.clone();
        connect.extend(file.connect.iter().cloned());
        let mut mcp = self.mcp.clone();
        mcp.extend(file.mcp.iter().cloned());

        let (default_explicit, default_allow) = if self.default_explicit {
            (self.default_explicit, self.default_allow)
        } else {
            (file.default_explicit, file.default_allow)
        };

        PolicySet {
            open,
            exec,
            connect,
            mcp,
            default_explicit,
            default_allow,
        }
    }

    /// Evaluate an open-file decision: first matching rule wins, default
    /// deny on no match (spec.md §4.5).
    #[must_use]
    pub fn check_open(&self, path: &str) -> Action {
        self.open
            .iter()
            .find(|r| r.matches(path))
            .map_or(Action::Deny, |r| r.action)
    }

    /// Evaluate an exec decision: first matching rule wins, default deny on
    /// no match (spec.md §4.5).
    #[must_use]
    pub fn check_exec(&self, path: &str) -> Action {
        self.exec
            .iter()
            .find(|r| r.matches(path))
            .map_or(Action::Deny, |r| r.action)
    }

    /// Evaluate a connect decision: first matching rule wins; on no match,
    /// fall back to `default_allow` (spec.md §4.5).
    #[must_use]
    pub fn check_connect(&self, host: Option<&str>, ip: Option<u32>, port: u16) -> Action {
        self.connect
            .iter()
            .find(|r| r.matches(host, ip, port))
            .map_or(if self.default_allow { Action::Allow } else { Action::Deny }, |r| r.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Operation, OpenMode};

    fn allow_dir(path: &str) -> OpenRule {
        OpenRule::new(Action::Allow, Operation::Open, path, true, OpenMode::Any)
    }

    fn deny_exact(path: &str) -> OpenRule {
        OpenRule::new(Action::Deny, Operation::Open, path, false, OpenMode::Any)
    }

    #[test]
    fn first_match_wins_across_composed_sets() {
        let mut runtime = PolicySet::empty();
        runtime.open.push(allow_dir("/"));

        let mut file = PolicySet::empty();
        file.open.push(deny_exact("/etc/shadow"));

        let active = runtime.compose_over(&file);
        // Runtime's allow-all comes first, so it wins even though file
        // would have denied this specific path.
        assert_eq!(active.check_open("/etc/shadow"), Action::Allow);
    }

    #[test]
    fn file_rule_applies_when_runtime_has_no_match() {
        let runtime = PolicySet::empty();
        let mut file = PolicySet::empty();
        file.open.push(deny_exact("/etc/shadow"));

        let active = runtime.compose_over(&file);
        assert_eq!(active.check_open("/etc/shadow"), Action::Deny);
        assert_eq!(active.check_open("/etc/passwd"), Action::Deny); // default deny
    }

    #[test]
    fn connect_default_allow_used_on_no_match() {
        let mut set = PolicySet::empty();
        set.default_allow = true;
        set.default_explicit = true;
        assert_eq!(set.check_connect(Some("example.com"), None, 443), Action::Allow);
    }

    #[test]
    fn empty_policy_set_has_no_connect_allow() {
        let set = PolicySet::empty();
        assert!(!set.has_connect_allow());
    }
}
