//! Structural lint checks over the AST, producing warnings/errors with
//! stable codes and suggestions (spec.md §4.2, SPEC_FULL.md §4.2b).

use std::collections::HashSet;

use leash_core::PolicySet;

use crate::ast::{ActionName, Entity, Guard, Program, Statement};

/// Lint severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LintSeverity {
    /// Non-fatal — compilation proceeds.
    Warning,
    /// Fatal unless the caller passes `force`.
    Error,
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LintIssue {
    /// Severity.
    pub severity: LintSeverity,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Source line the issue is anchored to, if any.
    pub line: Option<usize>,
}

fn resource_key(stmt: &Statement) -> Option<String> {
    match &stmt.guard {
        Some(Guard::ResourceIn(entities)) => {
            let mut keys: Vec<String> = entities.iter().map(entity_key).collect();
            keys.sort();
            Some(keys.join(","))
        }
        _ => stmt.resource.as_ref().map(entity_key),
    }
}

fn entity_key(entity: &Entity) -> String {
    format!("{}::{}", entity.namespace, entity.value)
}

fn is_catch_all(stmt: &Statement) -> bool {
    match &stmt.guard {
        None => stmt.resource.is_none(),
        Some(Guard::ResourceIn(entities)) => entities
            .iter()
            .any(|e| matches!(e.namespace.as_str(), "Dir" | "Host" | "Ip") && (e.value == "/" || e.value == "*")),
        Some(Guard::Header { .. }) => false,
    }
}

/// Run the lint catalogue over `program`.
///
/// `force` suppresses the `no-connect-allow` error into a warning, mirroring
/// the `force=1` escape hatch spec.md §4.11/§4.9 grants to several mutation
/// endpoints.
#[must_use]
pub fn lint(program: &Program, compiled_policy_set: &PolicySet, force: bool) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    if program.statements.is_empty() {
        issues.push(LintIssue {
            severity: LintSeverity::Warning,
            code: "empty-program".to_string(),
            message: "policy source contains no statements".to_string(),
            line: None,
        });
    }

    lint_duplicates(program, &mut issues);
    lint_unreachable(program, &mut issues);
    lint_deny_after_allow(program, &mut issues);
    lint_no_connect_allow(compiled_policy_set, force, &mut issues);

    issues
}

fn lint_duplicates(program: &Program, issues: &mut Vec<LintIssue>) {
    let mut seen: HashSet<(String, String, Option<String>)> = HashSet::new();
    for stmt in &program.statements {
        let key = (format!("{:?}", stmt.effect), stmt.action.to_string(), resource_key(stmt));
        if !seen.insert(key) {
            issues.push(LintIssue {
                severity: LintSeverity::Warning,
                code: "duplicate-statement".to_string(),
                message: format!("statement at line {} duplicates an earlier statement", stmt.line),
                line: Some(stmt.line),
            });
        }
    }
}

fn lint_unreachable(program: &Program, issues: &mut Vec<LintIssue>) {
    let mut seen_catch_all: HashSet<String> = HashSet::new();
    for stmt in &program.statements {
        let family = stmt.action.to_string();
        if seen_catch_all.contains(&family) {
            issues.push(LintIssue {
                severity: LintSeverity::Warning,
                code: "unreachable-rule".to_string(),
                message: format!(
                    "statement at line {} can never match: an earlier catch-all rule for {family} already decides every request",
                    stmt.line
                ),
                line: Some(stmt.line),
            });
        }
        if is_catch_all(stmt) {
            seen_catch_all.insert(family);
        }
    }
}

fn lint_deny_after_allow(program: &Program, issues: &mut Vec<LintIssue>) {
    use crate::ast::Effect;
    let mut seen_allows: HashSet<(String, Option<String>)> = HashSet::new();
    for stmt in &program.statements {
        let key = (stmt.action.to_string(), resource_key(stmt));
        match stmt.effect {
            Effect::Permit => {
                seen_allows.insert(key);
            }
            Effect::Forbid if seen_allows.contains(&key) => {
                issues.push(LintIssue {
                    severity: LintSeverity::Warning,
                    code: "deny-after-allow-same-resource".to_string(),
                    message: format!(
                        "forbid at line {} targets the same resource as an earlier permit; the earlier permit wins (first match)",
                        stmt.line
                    ),
                    line: Some(stmt.line),
                });
            }
            Effect::Forbid => {}
        }
    }
}

fn lint_no_connect_allow(policy_set: &PolicySet, force: bool, issues: &mut Vec<LintIssue>) {
    if policy_set.connect.is_empty() && !policy_set.has_connect_allow() {
        // No connect statements at all is not itself an error — only
        // actively removing every allow while some existed is covered by
        // the caller diffing against the previous policy. Still worth a
        // warning so operators notice their agent has no network egress.
        issues.push(LintIssue {
            severity: LintSeverity::Warning,
            code: "no-connect-allow".to_string(),
            message: "policy grants no network-connect allow; outbound connections will be denied".to_string(),
            line: None,
        });
        return;
    }
    if !policy_set.has_connect_allow() && !force {
        issues.push(LintIssue {
            severity: LintSeverity::Error,
            code: "no-connect-allow".to_string(),
            message: "policy removes all network-connect allows; pass force=1 to apply anyway".to_string(),
            line: None,
        });
    }
}

/// Convenience: does `action` carry an unrecognized name?
#[must_use]
pub fn is_unknown_action(action: &ActionName) -> bool {
    matches!(action, ActionName::Unknown(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;

    #[test]
    fn empty_program_warns() {
        let compiled = compile("", "t.cedar").unwrap();
        let issues = lint(&compiled.program, &compiled.policy_set, false);
        assert!(issues.iter().any(|i| i.code == "empty-program"));
    }

    #[test]
    fn duplicate_statement_warns() {
        let src = r#"
            permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/bin/git" ] };
            permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/bin/git" ] };
        "#;
        let compiled = compile(src, "t.cedar").unwrap();
        let issues = lint(&compiled.program, &compiled.policy_set, false);
        assert!(issues.iter().any(|i| i.code == "duplicate-statement"));
    }

    #[test]
    fn unreachable_after_catch_all() {
        let src = r#"
            permit (principal, action == Action::"FileOpen", resource) when { resource in [ Dir::"/" ] };
            forbid (principal, action == Action::"FileOpen", resource) when { resource in [ File::"/etc/shadow" ] };
        "#;
        let compiled = compile(src, "t.cedar").unwrap();
        let issues = lint(&compiled.program, &compiled.policy_set, false);
        assert!(issues.iter().any(|i| i.code == "unreachable-rule"));
    }

    #[test]
    fn no_connect_allow_is_error_without_force() {
        let src = r#"forbid (principal, action == Action::"NetConnect", resource);"#;
        let compiled = compile(src, "t.cedar").unwrap();
        let issues = lint(&compiled.program, &compiled.policy_set, false);
        assert!(issues.iter().any(|i| i.code == "no-connect-allow" && i.severity == LintSeverity::Error));

        let forced = lint(&compiled.program, &compiled.policy_set, true);
        assert!(forced.iter().all(|i| i.code != "no-connect-allow" || i.severity == LintSeverity::Warning));
    }
}
