//! Applies [`HttpRewriteRule`]s to outbound request headers after TLS
//! termination (spec.md §4.6 step 3).

use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use leash_core::HttpRewriteRule;

/// Apply every rule in `rules` whose host pattern matches `host` to
/// `headers`, in statement order. A later matching rule for the same
/// header overwrites an earlier one, mirroring the first-match-wins
/// precedence used elsewhere only for decisions, not mutation: header
/// rewrites are cumulative, not first-wins, since each names a distinct
/// effect to apply.
pub fn apply(rules: &[HttpRewriteRule], host: &str, headers: &mut HeaderMap) {
    for rule in rules.iter().filter(|r| r.host_matches(host)) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(rule.header.as_bytes()),
            HeaderValue::from_str(&rule.value),
        ) else {
            continue;
        };
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_matching_rules_and_skips_others() {
        let rules = vec![
            HttpRewriteRule::new("api.example.com", "Authorization", "Bearer secret"),
            HttpRewriteRule::new("other.example.com", "X-Env", "prod"),
        ];
        let mut headers = HeaderMap::new();
        apply(&rules, "api.example.com", &mut headers);

        assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
        assert!(headers.get("x-env").is_none());
    }

    #[test]
    fn wildcard_host_rule_applies_to_subdomains() {
        let rules = vec![HttpRewriteRule::new("*.example.com", "X-Env", "prod")];
        let mut headers = HeaderMap::new();
        apply(&rules, "api.example.com", &mut headers);
        assert_eq!(headers.get("x-env").unwrap(), "prod");
    }
}
