//! Leash DSL - parses the permit/forbid policy language into an AST, then
//! compiles the AST into a [`leash_core::PolicySet`] plus HTTP rewrite
//! rules, and lints the AST for structural issues (spec.md §4.2, §4.4).
//!
//! Compilation of identical source is a pure function: no hidden state, no
//! I/O, no clock reads.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod ast;
mod compile;
mod error;
mod lexer;
mod lint;
mod parser;
mod render;

pub use ast::{ActionName, Effect, Entity, Guard, Program, Statement};
pub use compile::{compile, CompiledPolicy};
pub use error::{ErrorDetail, ParseError};
pub use lint::{lint, LintIssue, LintSeverity};
pub use render::{humanize_statement, render_program, render_statement, statement_id, structural_eq};
