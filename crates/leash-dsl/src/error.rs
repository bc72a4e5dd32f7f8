//! Structured compile errors carrying source coordinates, per spec.md §4.2.

use thiserror::Error;

/// A single structured error with enough context to render a caret-annotated
/// snippet in a UI (spec.md §4.2: `{file, line, column, caret_start, snippet,
/// message, code, suggestion}`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    /// Logical filename the source came from.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    /// Column at which the offending token starts (for caret placement).
    pub caret_start: usize,
    /// The offending source line, verbatim.
    pub snippet: String,
    /// Human-readable message.
    pub message: String,
    /// Stable machine-readable error code.
    pub code: String,
    /// Optional suggested fix.
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:{}:{}: {} [{}]", self.file, self.line, self.column, self.message, self.code)?;
        writeln!(f, "  {}", self.snippet)?;
        writeln!(f, "  {}^", " ".repeat(self.caret_start))?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Top-level compiler error: either a parse failure (with structured detail)
/// or a semantic rejection (empty program, unmatchable rule).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Lexing or parsing failed at a specific location.
    #[error("{0}")]
    Syntax(ErrorDetail),

    /// The source compiled to an AST but produced zero rules.
    #[error("policy source compiled to zero rules")]
    EmptyProgram,
}

impl ParseError {
    /// Extract the structured detail, if this is a syntax error.
    #[must_use]
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            ParseError::Syntax(detail) => Some(detail),
            ParseError::EmptyProgram => None,
        }
    }
}
