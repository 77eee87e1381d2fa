//! Expression language for the Storydeck engine.
//!
//! Compiles textual logical/arithmetic/relational expressions into a
//! persistent tree and evaluates them against a [`Context`] of named
//! scalars and host functions. The tree can also re-emit itself as
//! canonical source ([`Expr::write`]) or as an indented structural dump
//! ([`Expr::dump_structure`]), and every evaluation step can be
//! narrated into an optional [`Trace`] sink.

pub mod ast;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod writer;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use context::{Assignment, Context, SharedContext};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{ExprError, ExprResult};
pub use eval::Trace;
pub use value::{NativeFn, Value};
pub use writer::StringFormat;

/// Result of compiling an expression source string.
#[derive(Debug)]
pub struct CompileResult {
    /// The compiled tree, when lexing and parsing succeeded.
    pub expr: Option<Expr>,
    /// Errors and warnings, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile a source string, collecting diagnostics.
///
/// The legacy `=` equality spelling parses but is flagged with a
/// warning per use; the writer re-emits it as `==`.
pub fn compile(source: &str) -> CompileResult {
    let (tokens, lex_errors) = lexer::lex(source);

    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|e| Diagnostic::error(e.span, e.message))
        .collect();

    for (token, span) in &tokens {
        if matches!(token, lexer::Token::LegacyEq) {
            diagnostics.push(Diagnostic::warning(
                span.clone(),
                "'=' treated as equality; prefer '=='",
            ));
        }
    }

    match parser::parse(&tokens) {
        Ok(expr) => CompileResult {
            expr: Some(expr),
            diagnostics,
        },
        Err(parse_diagnostics) => {
            diagnostics.extend(parse_diagnostics);
            CompileResult {
                expr: None,
                diagnostics,
            }
        }
    }
}

/// Compile a source string, discarding warnings.
///
/// Any error-severity diagnostic collapses into [`ExprError::Parse`].
pub fn parse_expression(source: &str) -> ExprResult<Expr> {
    let result = compile(source);
    let errors: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.message.clone())
        .collect();

    match result.expr {
        Some(expr) if errors.is_empty() => Ok(expr),
        _ => Err(ExprError::Parse(errors.join("; "))),
    }
}
