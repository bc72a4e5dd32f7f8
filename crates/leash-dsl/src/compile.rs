//! Translates a parsed [`Program`] into a [`leash_core::PolicySet`] plus
//! HTTP rewrite rules (spec.md §4.2).

use leash_core::{Action, ConnectRule, ExecRule, HttpRewriteRule, McpRule, OpenMode, OpenRule, Operation, PolicySet};

use crate::ast::{ActionName, Effect, Entity, Guard, Program, Statement};
use crate::error::{ErrorDetail, ParseError};
use crate::lexer::lex;
use crate::parser::parse;

/// The output of a successful compile: the rule tables plus rewrite rules,
/// and the parsed AST so the lint engine and UI line-rendering can reuse it
/// without re-parsing.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    /// Compiled rule tables.
    pub policy_set: PolicySet,
    /// Compiled HTTP rewrite rules, in statement order.
    pub http_rewrites: Vec<HttpRewriteRule>,
    /// The parsed AST.
    pub program: Program,
}

impl Effect {
    fn action(self) -> Action {
        match self {
            Effect::Permit => Action::Allow,
            Effect::Forbid => Action::Deny,
        }
    }
}

/// Parse and compile `source`. `file` is a logical filename used only for
/// error coordinates.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] on a lexing/parsing failure. Does **not**
/// reject an empty program — callers that require non-empty output should
/// check `compiled.policy_set.is_empty()` and map it to
/// [`ParseError::EmptyProgram`] themselves, since some callers (e.g. the
/// watcher reloading a file that was temporarily truncated) want to observe
/// the distinction rather than have it raised automatically.
pub fn compile(source: &str, file: &str) -> Result<CompiledPolicy, ParseError> {
    let tokens = lex(source, file).map_err(ParseError::Syntax)?;
    let program = parse(&tokens, source, file).map_err(ParseError::Syntax)?;

    let mut policy_set = PolicySet::empty();
    let mut http_rewrites = Vec::new();

    for stmt in &program.statements {
        compile_statement(stmt, &mut policy_set, &mut http_rewrites);
    }

    Ok(CompiledPolicy { policy_set, http_rewrites, program })
}

fn compile_statement(stmt: &Statement, policy_set: &mut PolicySet, http_rewrites: &mut Vec<HttpRewriteRule>) {
    let action = stmt.effect.action();
    match &stmt.action {
        ActionName::FileOpen => compile_open(stmt, action, Operation::Open, OpenMode::Any, policy_set),
        ActionName::FileOpenReadOnly => compile_open(stmt, action, Operation::OpenReadOnly, OpenMode::ReadOnly, policy_set),
        ActionName::FileOpenReadWrite => compile_open(stmt, action, Operation::OpenReadWrite, OpenMode::ReadWrite, policy_set),
        ActionName::Exec => compile_exec(stmt, action, policy_set),
        ActionName::NetConnect => compile_connect(stmt, action, policy_set),
        ActionName::HttpRewrite => compile_http_rewrite(stmt, http_rewrites),
        ActionName::McpCall => compile_mcp(stmt, action, policy_set),
        ActionName::Unknown(_) => {
            // Forward-compatible: an unrecognized action family compiles to
            // no rules. The lint engine (not the compiler) is responsible
            // for surfacing this to the author.
        }
    }
}

fn entities_for(stmt: &Statement) -> Vec<&Entity> {
    match &stmt.guard {
        Some(Guard::ResourceIn(entities)) => entities.iter().collect(),
        _ => stmt.resource.iter().collect(),
    }
}

fn compile_open(stmt: &Statement, action: Action, operation: Operation, mode: OpenMode, policy_set: &mut PolicySet) {
    let entities = entities_for(stmt);
    if entities.is_empty() {
        policy_set.open.push(OpenRule::new(action, operation, "/", true, mode));
        return;
    }
    for entity in entities {
        let is_directory = entity.namespace != "File";
        policy_set.open.push(OpenRule::new(action, operation, &entity.value, is_directory, mode));
    }
}

fn compile_exec(stmt: &Statement, action: Action, policy_set: &mut PolicySet) {
    let entities = entities_for(stmt);
    if entities.is_empty() {
        policy_set.exec.push(ExecRule::new(action, "/", true));
        return;
    }
    for entity in entities {
        let is_directory = entity.namespace != "File";
        policy_set.exec.push(ExecRule::new(action, &entity.value, is_directory));
    }
}

/// Split `host[:port]` into its parts.
fn split_host_port(value: &str) -> (&str, Option<u16>) {
    match value.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            (host, port.parse().ok())
        }
        _ => (value, None),
    }
}

fn compile_connect(stmt: &Statement, action: Action, policy_set: &mut PolicySet) {
    let entities = entities_for(stmt);
    if entities.is_empty() {
        // A bare NetConnect statement sets the connect *default*, not a
        // positional rule: spec.md §3 models `default_explicit`/
        // `default_allow` as distinct state from the rule table.
        policy_set.default_explicit = true;
        policy_set.default_allow = action == Action::Allow;
        return;
    }
    for entity in entities {
        let rule = match entity.namespace.as_str() {
            "Ip" => {
                let (ip_str, port) = split_host_port(&entity.value);
                ip_str.parse::<std::net::Ipv4Addr>().ok().and_then(|ip| {
                    ConnectRule::new(action, None, Some(u32::from(ip)), port, false).ok()
                })
            }
            _ => {
                let (host, port) = split_host_port(&entity.value);
                ConnectRule::new(action, Some(host), None, port, false).ok()
            }
        };
        if let Some(rule) = rule {
            policy_set.connect.push(rule);
        }
    }
}

fn compile_http_rewrite(stmt: &Statement, http_rewrites: &mut Vec<HttpRewriteRule>) {
    let Some(Guard::Header { header, value: Some(value) }) = &stmt.guard else {
        return;
    };
    let host = stmt.resource.as_ref().map_or_else(|| "*".to_string(), |e| e.value.clone());
    http_rewrites.push(HttpRewriteRule::new(host, header.clone(), value.clone()));
}

fn compile_mcp(stmt: &Statement, action: Action, policy_set: &mut PolicySet) {
    let entities = entities_for(stmt);
    if entities.is_empty() {
        policy_set.mcp.push(McpRule { action, server: None, tool: None, is_wildcard: true });
        return;
    }
    for entity in entities {
        let (server, tool) = match entity.value.split_once(':') {
            Some((s, t)) => (Some(s.to_string()), Some(t.to_string())),
            None => (Some(entity.value.clone()), None),
        };
        policy_set.mcp.push(McpRule { action, server, tool, is_wildcard: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_sample_policy_without_error() {
        let compiled = compile(leash_test::sample_policy(), "test.cedar").unwrap();
        assert!(!compiled.policy_set.is_empty());
        assert_eq!(compiled.http_rewrites.len(), 1);
    }

    #[test]
    fn compile_is_pure_and_deterministic() {
        let a = compile(leash_test::sample_policy(), "test.cedar").unwrap();
        let b = compile(leash_test::sample_policy(), "test.cedar").unwrap();
        assert_eq!(a.policy_set, b.policy_set);
        assert_eq!(a.http_rewrites, b.http_rewrites);
    }

    #[test]
    fn bare_connect_statement_sets_default_not_a_rule() {
        let compiled = compile(r#"forbid (principal, action == Action::"NetConnect", resource);"#, "t.cedar").unwrap();
        assert!(compiled.policy_set.connect.is_empty());
        assert!(compiled.policy_set.default_explicit);
        assert!(!compiled.policy_set.default_allow);
    }

    #[test]
    fn directory_vs_file_namespace_sets_is_directory() {
        let compiled = compile(
            r#"permit (principal, action == Action::"FileOpen", resource) when { resource in [ Dir::"/a", File::"/b" ] };"#,
            "t.cedar",
        )
        .unwrap();
        assert!(compiled.policy_set.open[0].is_directory);
        assert!(!compiled.policy_set.open[1].is_directory);
    }

    #[test]
    fn connect_ip_entity_parses_port() {
        let compiled = compile(
            r#"permit (principal, action == Action::"NetConnect", resource) when { resource in [ Ip::"10.0.0.1:443" ] };"#,
            "t.cedar",
        )
        .unwrap();
        let rule = &compiled.policy_set.connect[0];
        assert_eq!(rule.dest_port, Some(443));
        assert!(rule.hostname.is_none());
    }

    #[test]
    fn empty_source_compiles_to_empty_policy_set() {
        let compiled = compile("", "t.cedar").unwrap();
        assert!(compiled.policy_set.is_empty());
        assert!(compiled.http_rewrites.is_empty());
    }
}
