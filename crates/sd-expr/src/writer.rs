//! Re-emission of expression trees as canonical source text.

use crate::ast::{Expr, UnaryOp};
use crate::value::Value;

/// How string literals render when an expression is written back out.
///
/// Passed as a parameter rather than held in process-global state, so
/// two callers can write with different styles concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringFormat {
    #[default]
    SingleQuote,
    EscapedSingleQuote,
    DoubleQuote,
    EscapedDoubleQuote,
}

pub fn format_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Compact decimal: integer-valued numbers print without a decimal
/// point ("42", not "42.0").
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn format_string(value: &str, format: StringFormat) -> String {
    match format {
        StringFormat::SingleQuote => format!("'{value}'"),
        StringFormat::EscapedSingleQuote => format!("\\'{value}\\'"),
        StringFormat::DoubleQuote => format!("\"{value}\""),
        StringFormat::EscapedDoubleQuote => format!("\\\"{value}\\\""),
    }
}

pub fn format_value(value: &Value, format: StringFormat) -> String {
    match value {
        Value::Bool(b) => format_bool(*b).to_string(),
        Value::Number(n) => format_number(*n),
        Value::Str(s) => format_string(s, format),
        Value::Fn(f) => format!("<fn/{}>", f.arity()),
    }
}

impl Expr {
    /// Write with the default single-quote string style.
    pub fn write(&self) -> String {
        self.write_with(StringFormat::default())
    }

    /// Reconstruct source text. A child of strictly lower precedence is
    /// parenthesized; equal precedence is not.
    pub fn write_with(&self, format: StringFormat) -> String {
        match self {
            Expr::Bool(b) => format_bool(*b).to_string(),
            Expr::Number(n) => format_number(*n),
            Expr::Str(s) => format_string(s, format),
            Expr::Variable(name) => name.clone(),
            Expr::Call { name, args } => {
                let written: Vec<String> = args.iter().map(|a| a.write_with(format)).collect();
                format!("{name}({})", written.join(", "))
            }
            Expr::Unary { op, operand } => {
                let mut operand_str = operand.write_with(format);
                if operand.precedence() < self.precedence() {
                    operand_str = format!("({operand_str})");
                }
                match op {
                    UnaryOp::Not => format!("not {operand_str}"),
                    UnaryOp::Neg => format!("-{operand_str}"),
                }
            }
            Expr::Binary { op, left, right } => {
                let mut left_str = left.write_with(format);
                let mut right_str = right.write_with(format);
                if left.precedence() < self.precedence() {
                    left_str = format!("({left_str})");
                }
                if right.precedence() < self.precedence() {
                    right_str = format!("({right_str})");
                }
                format!("{left_str} {} {right_str}", op.symbol())
            }
        }
    }
}
