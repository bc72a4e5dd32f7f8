//! Hand-rolled lexer for the permit/forbid grammar (spec.md §6). The
//! grammar is small enough that a parser-combinator dependency would be
//! overhead; this follows the same hand-written, multi-stage parsing style
//! the teacher uses for its own config/manifest loaders.

use crate::error::ErrorDetail;

/// A lexical token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// 1-based line.
    pub line: usize,
    /// 1-based column of the token's first character.
    pub column: usize,
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `::`
    DoubleColon,
    /// `==`
    EqEq,
    /// `&&`
    AmpAmp,
    /// Bare identifier.
    Ident(String),
    /// Double-quoted string literal (unescaped contents).
    Str(String),
    /// End of input.
    Eof,
}

/// Tokenize `source`. `file` is used only to stamp error locations.
///
/// # Errors
///
/// Returns an [`ErrorDetail`] pointing at the first unrecognized character
/// or unterminated string literal.
pub fn lex(source: &str, file: &str) -> Result<Vec<Token>, ErrorDetail> {
    let mut tokens = Vec::new();
    let lines: Vec<&str> = source.lines().collect();
    let mut chars = source.char_indices().peekable();
    let mut line = 1usize;
    let mut col = 1usize;
    let mut line_start_byte = 0usize;

    let err_at = |line: usize, col: usize, msg: &str, code: &str| -> ErrorDetail {
        let snippet = lines.get(line.saturating_sub(1)).copied().unwrap_or("").to_string();
        ErrorDetail {
            file: file.to_string(),
            line,
            column: col,
            caret_start: col.saturating_sub(1),
            snippet,
            message: msg.to_string(),
            code: code.to_string(),
            suggestion: None,
        }
    };

    while let Some(&(byte_idx, ch)) = chars.peek() {
        match ch {
            ' ' | '\t' | '\r' => {
                chars.next();
                col += 1;
            }
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
                line_start_byte = byte_idx + 1;
                let _ = line_start_byte;
            }
            '#' => {
                // Line comment.
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, line, column: col });
                chars.next();
                col += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, line, column: col });
                chars.next();
                col += 1;
            }
            '{' => {
                tokens.push(Token { kind: TokenKind::LBrace, line, column: col });
                chars.next();
                col += 1;
            }
            '}' => {
                tokens.push(Token { kind: TokenKind::RBrace, line, column: col });
                chars.next();
                col += 1;
            }
            '[' => {
                tokens.push(Token { kind: TokenKind::LBracket, line, column: col });
                chars.next();
                col += 1;
            }
            ']' => {
                tokens.push(Token { kind: TokenKind::RBracket, line, column: col });
                chars.next();
                col += 1;
            }
            ',' => {
                tokens.push(Token { kind: TokenKind::Comma, line, column: col });
                chars.next();
                col += 1;
            }
            ';' => {
                tokens.push(Token { kind: TokenKind::Semicolon, line, column: col });
                chars.next();
                col += 1;
            }
            '.' => {
                tokens.push(Token { kind: TokenKind::Dot, line, column: col });
                chars.next();
                col += 1;
            }
            ':' => {
                let start_col = col;
                chars.next();
                col += 1;
                if chars.peek().map(|&(_, c)| c) == Some(':') {
                    chars.next();
                    col += 1;
                    tokens.push(Token { kind: TokenKind::DoubleColon, line, column: start_col });
                } else {
                    return Err(err_at(line, start_col, "expected '::' after ':'", "E_LEX_COLON"));
                }
            }
            '=' => {
                let start_col = col;
                chars.next();
                col += 1;
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                    col += 1;
                    tokens.push(Token { kind: TokenKind::EqEq, line, column: start_col });
                } else {
                    return Err(err_at(line, start_col, "expected '==' (single '=' is not valid here)", "E_LEX_EQ"));
                }
            }
            '&' => {
                let start_col = col;
                chars.next();
                col += 1;
                if chars.peek().map(|&(_, c)| c) == Some('&') {
                    chars.next();
                    col += 1;
                    tokens.push(Token { kind: TokenKind::AmpAmp, line, column: start_col });
                } else {
                    return Err(err_at(line, start_col, "expected '&&'", "E_LEX_AMP"));
                }
            }
            '"' => {
                let start_col = col;
                let start_line = line;
                chars.next();
                col += 1;
                let mut value = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        col += 1;
                        break;
                    }
                    if c == '\n' {
                        break;
                    }
                    value.push(c);
                    col += 1;
                }
                if !closed {
                    return Err(err_at(start_line, start_col, "unterminated string literal", "E_LEX_STRING"));
                }
                tokens.push(Token { kind: TokenKind::Str(value), line: start_line, column: start_col });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start_col = col;
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token { kind: TokenKind::Ident(ident), line, column: start_col });
            }
            other => {
                return Err(err_at(line, col, &format!("unexpected character '{other}'"), "E_LEX_UNEXPECTED"));
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, column: col });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_basic_statement() {
        let tokens = lex(r#"permit (principal, action == Action::"FileOpen", resource);"#, "test.cedar").unwrap();
        assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::DoubleColon)));
        assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::Str(s) if s == "FileOpen")));
    }

    #[test]
    fn reports_unterminated_string() {
        let err = lex(r#"permit (principal, action == Action::"FileOpen"#, "test.cedar").unwrap_err();
        assert_eq!(err.code, "E_LEX_STRING");
    }

    #[test]
    fn skips_comments() {
        let tokens = lex("# a comment\npermit", "test.cedar").unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::Ident(s) if s == "permit"));
    }
}
