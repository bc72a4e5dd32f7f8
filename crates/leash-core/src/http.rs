//! HTTP rewrite rule: `{host, header, value}`, applied to outbound request
//! headers after TLS termination (spec.md §3, §4.6).

use serde::{Deserialize, Serialize};

/// A single header-rewrite rule scoped to a host pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpRewriteRule {
    /// Host pattern: exact (`api.example.com`) or `*.suffix` (`*.example.com`).
    pub host: String,
    /// Header name to rewrite (case-insensitive at match time).
    pub header: String,
    /// Replacement value.
    pub value: String,
}

impl HttpRewriteRule {
    /// Construct a new rewrite rule; the host pattern is stored verbatim and
    /// lower-cased since header/host matching is case-insensitive.
    #[must_use]
    pub fn new(host: impl Into<String>, header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            header: header.into(),
            value: value.into(),
        }
    }

    /// Whether this rule's host pattern matches the given request host.
    #[must_use]
    pub fn host_matches(&self, request_host: &str) -> bool {
        let request_host = request_host.to_ascii_lowercase();
        if let Some(suffix) = self.host.strip_prefix("*.") {
            request_host == suffix || request_host.ends_with(&format!(".{suffix}"))
        } else {
            request_host == self.host
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_host_match() {
        let rule = HttpRewriteRule::new("api.example.com", "Authorization", "Bearer x");
        assert!(rule.host_matches("api.example.com"));
        assert!(!rule.host_matches("other.example.com"));
    }

    #[test]
    fn wildcard_suffix_match() {
        let rule = HttpRewriteRule::new("*.example.com", "X-Env", "prod");
        assert!(rule.host_matches("api.example.com"));
        assert!(rule.host_matches("example.com"));
        assert!(!rule.host_matches("example.org"));
    }
}
