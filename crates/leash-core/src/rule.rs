//! Rule variants: Open, Exec, Connect, and Mcp.
//!
//! Rules are immutable once constructed. Equivalence is defined over
//! normalized fields (lower-cased hostnames, trimmed paths, canonical IPs),
//! per spec.md §4.1.

use serde::{Deserialize, Serialize};

use crate::{canonical_ipv4, normalize_hostname, normalize_path, BoundedBuf, CoreError, CoreResult};

/// Allow or deny an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Permit the operation.
    Allow,
    /// Forbid the operation.
    Deny,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// The operation tag carried by every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Generic file open (read or write).
    Open,
    /// File open restricted to read-only access.
    OpenReadOnly,
    /// File open restricted to read-write access.
    OpenReadWrite,
    /// Process execution.
    Exec,
    /// Outbound network connection.
    Connect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::OpenReadOnly => "open-read-only",
            Self::OpenReadWrite => "open-read-write",
            Self::Exec => "exec",
            Self::Connect => "connect",
        };
        write!(f, "{s}")
    }
}

/// Read/write mode discriminator carried by open rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Read-only access.
    ReadOnly,
    /// Read-write access.
    ReadWrite,
    /// Either, unspecified by the originating statement.
    Any,
}

/// A file-open rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenRule {
    /// Allow or deny.
    pub action: Action,
    /// Operation tag (one of the Open variants).
    pub operation: Operation,
    /// Normalized path this rule matches.
    pub path: BoundedBuf,
    /// When set, `path` is a prefix match over `/`-normalized boundaries.
    pub is_directory: bool,
    /// Read/write discriminator.
    pub mode: OpenMode,
}

impl OpenRule {
    /// Construct a new open rule, normalizing `path`.
    #[must_use]
    pub fn new(action: Action, operation: Operation, path: &str, is_directory: bool, mode: OpenMode) -> Self {
        Self {
            action,
            operation,
            path: BoundedBuf::new(normalize_path(path)),
            is_directory,
            mode,
        }
    }

    /// Whether this rule matches the given candidate path.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = normalize_path(candidate);
        let rule_path = self.path.as_str();
        if self.is_directory {
            candidate == *rule_path
                || candidate.starts_with(&format!("{rule_path}/"))
                || (*rule_path == "/" && candidate.starts_with('/'))
        } else {
            candidate == *rule_path
        }
    }
}

/// A process-execution rule. Shares its shape with [`OpenRule`] minus the
/// read/write mode, per spec.md §3 ("Open/Exec rules additionally carry a
/// path ... and for open a read/write mode discriminator").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecRule {
    /// Allow or deny.
    pub action: Action,
    /// Always [`Operation::Exec`].
    pub operation: Operation,
    /// Normalized path this rule matches.
    pub path: BoundedBuf,
    /// When set, `path` is a prefix match.
    pub is_directory: bool,
}

impl ExecRule {
    /// Construct a new exec rule, normalizing `path`.
    #[must_use]
    pub fn new(action: Action, path: &str, is_directory: bool) -> Self {
        Self {
            action,
            operation: Operation::Exec,
            path: BoundedBuf::new(normalize_path(path)),
            is_directory,
        }
    }

    /// Whether this rule matches the given candidate path.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = normalize_path(candidate);
        let rule_path = self.path.as_str();
        if self.is_directory {
            candidate == *rule_path || candidate.starts_with(&format!("{rule_path}/"))
        } else {
            candidate == *rule_path
        }
    }
}

/// A network-connect rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectRule {
    /// Allow or deny.
    pub action: Action,
    /// Always [`Operation::Connect`].
    pub operation: Operation,
    /// Case-normalized hostname, when specified.
    pub hostname: Option<BoundedBuf>,
    /// Packed IPv4 destination, when specified.
    pub dest_ip: Option<u32>,
    /// Destination port, when specified.
    pub dest_port: Option<u16>,
    /// Matches any host/IP.
    pub is_wildcard: bool,
}

impl ConnectRule {
    /// Construct a new connect rule.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnmatchableConnectRule`] if the rule has no
    /// hostname, IP, or wildcard flag — it could never match anything.
    pub fn new(
        action: Action,
        hostname: Option<&str>,
        dest_ip: Option<u32>,
        dest_port: Option<u16>,
        is_wildcard: bool,
    ) -> CoreResult<Self> {
        if hostname.is_none() && dest_ip.is_none() && !is_wildcard {
            return Err(CoreError::UnmatchableConnectRule);
        }
        Ok(Self {
            action,
            operation: Operation::Connect,
            hostname: hostname.map(|h| BoundedBuf::new(normalize_hostname(h))),
            dest_ip,
            dest_port,
            is_wildcard,
        })
    }

    /// Whether this rule matches the given candidate hostname/IP/port.
    ///
    /// Per §9's open question, asymmetric hostname/IP precedence is resolved
    /// uniformly here: hostname is checked before IP when both are present
    /// on the rule (see DESIGN.md).
    #[must_use]
    pub fn matches(&self, candidate_host: Option<&str>, candidate_ip: Option<u32>, candidate_port: u16) -> bool {
        if !self.port_matches(candidate_port) {
            return false;
        }
        if self.is_wildcard {
            return true;
        }
        if let Some(rule_host) = &self.hostname {
            if let Some(host) = candidate_host {
                if rule_host.as_str() == normalize_hostname(host) {
                    return true;
                }
            }
        }
        if let Some(rule_ip) = self.dest_ip {
            if let Some(ip) = candidate_ip {
                if rule_ip == ip {
                    return true;
                }
            }
        }
        false
    }

    fn port_matches(&self, candidate_port: u16) -> bool {
        self.dest_port.is_none_or(|p| p == candidate_port)
    }
}

/// An MCP-call rule. `[SUPPLEMENT]` — spec.md's data model names an MCP rule
/// sequence without giving it a shape; this is the minimal shape implied by
/// the grammar's `MCP-call` action family (see SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct McpRule {
    /// Allow or deny.
    pub action: Action,
    /// MCP server name this rule matches, when specified.
    pub server: Option<String>,
    /// MCP tool name this rule matches, when specified.
    pub tool: Option<String>,
    /// Matches any server/tool.
    pub is_wildcard: bool,
}

impl McpRule {
    /// Whether this rule matches the given candidate server/tool.
    #[must_use]
    pub fn matches(&self, candidate_server: &str, candidate_tool: &str) -> bool {
        if self.is_wildcard {
            return true;
        }
        let server_ok = self.server.as_deref().is_none_or(|s| s == candidate_server);
        let tool_ok = self.tool.as_deref().is_none_or(|t| t == candidate_tool);
        server_ok && tool_ok && (self.server.is_some() || self.tool.is_some())
    }
}

/// Tagged union of the three kernel-facing rule families plus Mcp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Rule {
    /// File-open rule.
    Open(OpenRule),
    /// Process-exec rule.
    Exec(ExecRule),
    /// Network-connect rule.
    Connect(ConnectRule),
    /// MCP-call rule.
    Mcp(McpRule),
}

impl Rule {
    /// Deterministic canonical stringification, used as a content-hash
    /// anchor for UI display and PATCH identity (spec.md §4.1).
    #[must_use]
    pub fn canonical_string(&self) -> String {
        match self {
            Rule::Open(r) => format!(
                "{} {} path={} dir={} mode={:?}",
                r.action, r.operation, r.path, r.is_directory, r.mode
            ),
            Rule::Exec(r) => format!("{} exec path={} dir={}", r.action, r.path, r.is_directory),
            Rule::Connect(r) => format!(
                "{} connect host={} ip={} port={} wildcard={}",
                r.action,
                r.hostname.as_ref().map(BoundedBuf::to_string).unwrap_or_default(),
                r.dest_ip.map(canonical_ipv4).unwrap_or_default(),
                r.dest_port.map(|p| p.to_string()).unwrap_or_default(),
                r.is_wildcard
            ),
            Rule::Mcp(r) => format!(
                "{} mcp server={} tool={} wildcard={}",
                r.action,
                r.server.as_deref().unwrap_or(""),
                r.tool.as_deref().unwrap_or(""),
                r.is_wildcard
            ),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rule_directory_prefix_match() {
        let rule = OpenRule::new(Action::Allow, Operation::Open, "/workspace", true, OpenMode::Any);
        assert!(rule.matches("/workspace/src/main.rs"));
        assert!(rule.matches("/workspace"));
        assert!(!rule.matches("/workspace-other/main.rs"));
    }

    #[test]
    fn open_rule_exact_match_only() {
        let rule = OpenRule::new(Action::Deny, Operation::Open, "/etc/shadow", false, OpenMode::Any);
        assert!(rule.matches("/etc/shadow"));
        assert!(!rule.matches("/etc/shadow/extra"));
    }

    #[test]
    fn connect_rule_wildcard_matches_anything() {
        let rule = ConnectRule::new(Action::Allow, None, None, None, true).unwrap();
        assert!(rule.matches(Some("example.com"), None, 443));
        assert!(rule.matches(None, Some(0x0100_0001), 22));
    }

    #[test]
    fn connect_rule_hostname_then_ip_precedence() {
        let rule = ConnectRule::new(Action::Allow, Some("Example.COM"), Some(0x0100_0001), None, false).unwrap();
        assert!(rule.matches(Some("example.com"), None, 80));
        assert!(rule.matches(None, Some(0x0100_0001), 80));
        assert!(!rule.matches(Some("other.com"), Some(0x0200_0002), 80));
    }

    #[test]
    fn connect_rule_port_gates_match() {
        let rule = ConnectRule::new(Action::Allow, Some("example.com"), None, Some(443), false).unwrap();
        assert!(rule.matches(Some("example.com"), None, 443));
        assert!(!rule.matches(Some("example.com"), None, 80));
    }

    #[test]
    fn connect_rule_requires_a_target() {
        let err = ConnectRule::new(Action::Allow, None, None, None, false).unwrap_err();
        assert!(matches!(err, CoreError::UnmatchableConnectRule));
    }

    #[test]
    fn canonical_string_is_deterministic() {
        let a = OpenRule::new(Action::Allow, Operation::Open, "/a", false, OpenMode::ReadOnly);
        let b = OpenRule::new(Action::Allow, Operation::Open, "/a", false, OpenMode::ReadOnly);
        assert_eq!(Rule::Open(a).canonical_string(), Rule::Open(b).canonical_string());
    }
}
