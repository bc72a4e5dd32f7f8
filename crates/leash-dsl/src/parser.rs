//! Recursive-descent parser producing a [`Program`] from a token stream.

use crate::ast::{ActionName, Effect, Entity, Guard, Program, Statement};
use crate::error::ErrorDetail;
use crate::lexer::{Token, TokenKind};

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    file: &'a str,
    source_lines: Vec<&'a str>,
}

/// Parse a token stream into a [`Program`].
///
/// # Errors
///
/// Returns an [`ErrorDetail`] at the first structurally invalid construct.
pub fn parse(tokens: &[Token], source: &str, file: &str) -> Result<Program, ErrorDetail> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        file,
        source_lines: source.lines().collect(),
    };
    parser.parse_program()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, tok: &Token, message: impl Into<String>, code: &str, suggestion: Option<&str>) -> ErrorDetail {
        let snippet = self
            .source_lines
            .get(tok.line.saturating_sub(1))
            .copied()
            .unwrap_or("")
            .to_string();
        ErrorDetail {
            file: self.file.to_string(),
            line: tok.line,
            column: tok.column,
            caret_start: tok.column.saturating_sub(1),
            snippet,
            message: message.into(),
            code: code.to_string(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(), ErrorDetail> {
        let tok = self.advance();
        match &tok.kind {
            TokenKind::Ident(s) if s == expected => Ok(()),
            _ => Err(self.err(
                &tok,
                format!("expected '{expected}'"),
                "E_PARSE_EXPECTED_IDENT",
                Some(&format!("insert '{expected}' here")),
            )),
        }
    }

    fn expect_kind(&mut self, expected: &TokenKind, what: &str) -> Result<Token, ErrorDetail> {
        let tok = self.advance();
        if std::mem::discriminant(&tok.kind) == std::mem::discriminant(expected) {
            Ok(tok)
        } else {
            Err(self.err(&tok, format!("expected {what}"), "E_PARSE_EXPECTED_TOKEN", None))
        }
    }

    fn expect_str(&mut self) -> Result<(String, Token), ErrorDetail> {
        let tok = self.advance();
        match tok.kind.clone() {
            TokenKind::Str(s) => Ok((s, tok)),
            _ => Err(self.err(&tok, "expected a string literal", "E_PARSE_EXPECTED_STRING", None)),
        }
    }

    fn parse_program(&mut self) -> Result<Program, ErrorDetail> {
        let mut statements = Vec::new();
        let mut sequence = 0;
        loop {
            if matches!(self.peek().kind, TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement(sequence)?);
            sequence += 1;
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self, sequence: usize) -> Result<Statement, ErrorDetail> {
        let head = self.advance();
        let effect = match &head.kind {
            TokenKind::Ident(s) if s == "permit" => Effect::Permit,
            TokenKind::Ident(s) if s == "forbid" => Effect::Forbid,
            _ => {
                return Err(self.err(
                    &head,
                    "expected 'permit' or 'forbid'",
                    "E_PARSE_EXPECTED_EFFECT",
                    Some("statements must start with 'permit' or 'forbid'"),
                ))
            }
        };
        let line = head.line;

        self.expect_kind(&TokenKind::LParen, "'('")?;
        self.expect_ident("principal")?;
        self.expect_kind(&TokenKind::Comma, "','")?;

        self.expect_ident("action")?;
        self.expect_kind(&TokenKind::EqEq, "'=='")?;
        self.expect_ident("Action")?;
        self.expect_kind(&TokenKind::DoubleColon, "'::'")?;
        let (action_ident, _) = self.expect_str()?;
        let action = ActionName::from_ident(&action_ident);
        self.expect_kind(&TokenKind::Comma, "','")?;

        self.expect_ident("resource")?;
        let resource = if matches!(self.peek().kind, TokenKind::EqEq) {
            self.advance();
            Some(self.parse_entity()?)
        } else {
            None
        };
        self.expect_kind(&TokenKind::RParen, "')'")?;

        let guard = if matches!(self.peek().kind, TokenKind::Ident(ref s) if s == "when") {
            self.advance();
            self.expect_kind(&TokenKind::LBrace, "'{'")?;
            let guard = self.parse_guard()?;
            self.expect_kind(&TokenKind::RBrace, "'}'")?;
            Some(guard)
        } else {
            None
        };

        self.expect_kind(&TokenKind::Semicolon, "';'")?;

        Ok(Statement { effect, action, resource, guard, line, sequence })
    }

    fn parse_entity(&mut self) -> Result<Entity, ErrorDetail> {
        let ns_tok = self.advance();
        let namespace = match ns_tok.kind.clone() {
            TokenKind::Ident(s) => s,
            _ => return Err(self.err(&ns_tok, "expected an entity namespace", "E_PARSE_EXPECTED_NAMESPACE", None)),
        };
        self.expect_kind(&TokenKind::DoubleColon, "'::'")?;
        let (value, _) = self.expect_str()?;
        Ok(Entity { namespace, value })
    }

    fn parse_guard(&mut self) -> Result<Guard, ErrorDetail> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(s) if s == "resource" => {
                self.advance();
                self.expect_ident("in")?;
                self.expect_kind(&TokenKind::LBracket, "'['")?;
                let mut entities = vec![self.parse_entity()?];
                while matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    entities.push(self.parse_entity()?);
                }
                self.expect_kind(&TokenKind::RBracket, "']'")?;
                Ok(Guard::ResourceIn(entities))
            }
            TokenKind::Ident(s) if s == "context" => {
                self.advance();
                self.expect_kind(&TokenKind::Dot, "'.'")?;
                self.expect_ident("header")?;
                self.expect_kind(&TokenKind::EqEq, "'=='")?;
                let (header, _) = self.expect_str()?;

                let value = if matches!(self.peek().kind, TokenKind::AmpAmp) {
                    self.advance();
                    self.expect_ident("context")?;
                    self.expect_kind(&TokenKind::Dot, "'.'")?;
                    self.expect_ident("value")?;
                    self.expect_kind(&TokenKind::EqEq, "'=='")?;
                    let (value, _) = self.expect_str()?;
                    Some(value)
                } else {
                    None
                };

                Ok(Guard::Header { header, value })
            }
            _ => Err(self.err(
                &tok,
                "expected 'resource in [...]' or 'context.header == ...'",
                "E_PARSE_EXPECTED_GUARD",
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_source(src: &str) -> Result<Program, ErrorDetail> {
        let tokens = lex(src, "test.cedar").unwrap();
        parse(&tokens, src, "test.cedar")
    }

    #[test]
    fn parses_resource_in_guard() {
        let program = parse_source(
            r#"permit (principal, action == Action::"FileOpen", resource) when { resource in [ Dir::"/workspace" ] };"#,
        )
        .unwrap();
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(program.statements[0].guard, Some(Guard::ResourceIn(_))));
    }

    #[test]
    fn parses_header_guard_with_value() {
        let program = parse_source(
            r#"permit (principal, action == Action::"HttpRewrite", resource == Host::"example.com") when { context.header == "Authorization" && context.value == "Bearer X" };"#,
        )
        .unwrap();
        match &program.statements[0].guard {
            Some(Guard::Header { header, value }) => {
                assert_eq!(header, "Authorization");
                assert_eq!(value.as_deref(), Some("Bearer X"));
            }
            other => panic!("unexpected guard: {other:?}"),
        }
    }

    #[test]
    fn parses_bare_statement_without_guard() {
        let program = parse_source(r#"forbid (principal, action == Action::"NetConnect", resource);"#).unwrap();
        assert!(program.statements[0].guard.is_none());
        assert!(program.statements[0].resource.is_none());
    }

    #[test]
    fn rejects_missing_semicolon() {
        let err = parse_source(r#"forbid (principal, action == Action::"NetConnect", resource)"#).unwrap_err();
        assert_eq!(err.code, "E_PARSE_EXPECTED_TOKEN");
    }

    #[test]
    fn multiple_statements_preserve_order() {
        let program = parse_source(
            r#"
            permit (principal, action == Action::"Exec", resource) when { resource in [ File::"/usr/bin/git" ] };
            forbid (principal, action == Action::"Exec", resource) when { resource in [ File::"/usr/bin/curl" ] };
            "#,
        )
        .unwrap();
        assert_eq!(program.statements[0].sequence, 0);
        assert_eq!(program.statements[1].sequence, 1);
    }
}
