//! Render statements back to canonical policy source text, and to the
//! humanized form `/api/policies/lines` exposes for the control UI
//! (spec.md §4.9).

use crate::ast::{ActionName, Effect, Entity, Guard, Program, Statement};

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::\"{}\"", self.namespace, self.value)
    }
}

/// Render a single statement back to its canonical source text. Round-trips
/// through [`crate::compile`] to the same rules the statement produced;
/// whitespace and phrasing are canonicalized, not preserved verbatim, so
/// two statements that compile identically render identically.
#[must_use]
pub fn render_statement(stmt: &Statement) -> String {
    let effect = match stmt.effect {
        Effect::Permit => "permit",
        Effect::Forbid => "forbid",
    };
    let resource = match &stmt.resource {
        Some(entity) => format!("resource == {entity}"),
        None => "resource".to_string(),
    };
    let mut rendered = format!("{effect} (principal, action == Action::\"{}\", {resource})", stmt.action);
    if let Some(guard) = &stmt.guard {
        rendered.push_str(" when { ");
        rendered.push_str(&render_guard(guard));
        rendered.push_str(" }");
    }
    rendered.push(';');
    rendered
}

fn render_guard(guard: &Guard) -> String {
    match guard {
        Guard::ResourceIn(entities) => {
            let list = entities.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            format!("resource in [ {list} ]")
        }
        Guard::Header { header, value: Some(value) } => {
            format!("context.header == \"{header}\" && context.value == \"{value}\"")
        }
        Guard::Header { header, value: None } => format!("context.header == \"{header}\""),
    }
}

/// Render every statement in `program`, one per line, in source order. The
/// output is valid source and re-compiles to the same [`leash_core::PolicySet`]
/// (module-level doc) as `program` did.
#[must_use]
pub fn render_program(program: &Program) -> String {
    program.statements.iter().map(render_statement).collect::<Vec<_>>().join("\n")
}

/// A short human sentence summarizing a statement's effect, for the control
/// UI's rule list.
#[must_use]
pub fn humanize_statement(stmt: &Statement) -> String {
    let verb = match stmt.effect {
        Effect::Permit => "Allow",
        Effect::Forbid => "Deny",
    };
    let action = match &stmt.action {
        ActionName::FileOpen => "opening files",
        ActionName::FileOpenReadOnly => "opening files read-only",
        ActionName::FileOpenReadWrite => "opening files read-write",
        ActionName::Exec => "executing",
        ActionName::NetConnect => "connecting to",
        ActionName::HttpRewrite => "rewriting HTTP headers for",
        ActionName::McpCall => "calling MCP tools on",
        ActionName::Unknown(name) => return format!("{verb} unrecognized action \"{name}\""),
    };
    let targets = entity_targets(stmt);
    if targets.is_empty() {
        format!("{verb} {action} anything")
    } else {
        format!("{verb} {action} {}", targets.join(", "))
    }
}

fn entity_targets(stmt: &Statement) -> Vec<String> {
    match &stmt.guard {
        Some(Guard::ResourceIn(entities)) => entities.iter().map(ToString::to_string).collect(),
        Some(Guard::Header { header, value }) => vec![match value {
            Some(v) => format!("header {header}={v}"),
            None => format!("header {header}"),
        }],
        None => stmt.resource.iter().map(ToString::to_string).collect(),
    }
}

/// Whether two statements are structurally equivalent — same effect,
/// action, resource and guard — ignoring source position (`line`,
/// `sequence`). This is the equality PATCH's de-duplication and
/// removal-by-id operate on (spec.md §4.9).
#[must_use]
pub fn structural_eq(a: &Statement, b: &Statement) -> bool {
    render_statement(a) == render_statement(b)
}

/// A stable identifier for a statement, derived from its structural fields
/// only, so the same logical statement always gets the same id regardless
/// of where it sits in the source (spec.md §4.9's PATCH `remove` "by stable
/// statement id").
#[must_use]
pub fn statement_id(stmt: &Statement) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    render_statement(stmt).hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;

    #[test]
    fn render_round_trips_through_compile() {
        let src = r#"permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/usr/bin/git" ] };"#;
        let compiled = compile(src, "t.cedar").unwrap();
        let rendered = render_program(&compiled.program);
        let recompiled = compile(&rendered, "t.cedar").unwrap();
        assert_eq!(compiled.policy_set, recompiled.policy_set);
    }

    #[test]
    fn statement_id_is_stable_across_position() {
        let src = r#"
            permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/a" ] };
            permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/b" ] };
        "#;
        let compiled = compile(src, "t.cedar").unwrap();
        let a_first = statement_id(&compiled.program.statements[0]);

        let reordered = format!(
            "{}\n{}",
            render_statement(&compiled.program.statements[1]),
            render_statement(&compiled.program.statements[0])
        );
        let recompiled = compile(&reordered, "t.cedar").unwrap();
        let a_second = statement_id(&recompiled.program.statements[1]);
        assert_eq!(a_first, a_second);
    }

    #[test]
    fn structural_eq_ignores_sequence_and_line() {
        let src = r#"permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/a" ] };"#;
        let a = compile(src, "one.cedar").unwrap();
        let b = compile(&format!("\n\n{src}"), "two.cedar").unwrap();
        assert!(structural_eq(&a.program.statements[0], &b.program.statements[0]));
    }

    #[test]
    fn humanize_describes_catch_all() {
        let compiled = compile(r#"permit (principal, action == Action::"NetConnect", resource);"#, "t.cedar").unwrap();
        let line = humanize_statement(&compiled.program.statements[0]);
        assert_eq!(line, "Allow connecting to anything");
    }
}
