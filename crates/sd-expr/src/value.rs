//! Scalar values and the coercion rules shared by every operator.

use std::fmt;
use std::rc::Rc;

use crate::error::{ExprError, ExprResult};
use crate::writer::{self, StringFormat};

/// A host-provided function: fixed arity, scalar return.
///
/// Argument type checking is the host function's responsibility; the
/// engine enforces only the arity and the return kind.
#[derive(Clone)]
pub struct NativeFn {
    arity: usize,
    func: Rc<dyn Fn(&[Value]) -> ExprResult<Value>>,
}

impl NativeFn {
    pub fn new<F>(arity: usize, func: F) -> Self
    where
        F: Fn(&[Value]) -> ExprResult<Value> + 'static,
    {
        Self {
            arity,
            func: Rc::new(func),
        }
    }

    /// Number of arguments the function declares.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke with already-evaluated arguments.
    pub fn call(&self, args: &[Value]) -> ExprResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn/{}>", self.arity)
    }
}

/// A dynamically typed value flowing through evaluation.
///
/// Expressions always yield one of the three scalar variants. `Fn`
/// exists only as a context entry and never as an intermediate result.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    Fn(NativeFn),
}

impl Value {
    /// Human-readable kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Fn(_) => "function",
        }
    }

    /// True for the three kinds an expression may yield.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Fn(_))
    }

    /// Coerce to a boolean.
    ///
    /// Numbers are true when nonzero; strings are true for a lowercased
    /// "true" or "1" and false otherwise.
    pub fn to_bool(&self) -> ExprResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Str(s) => Ok(s.to_lowercase() == "true" || s == "1"),
            Value::Fn(_) => Err(self.mismatch("bool")),
        }
    }

    /// Coerce to a number.
    ///
    /// Booleans become 1 or 0; strings must parse in full as a decimal
    /// (optional leading minus, optional fraction).
    pub fn to_number(&self) -> ExprResult<f64> {
        match self {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::Str(s) => parse_decimal(s).ok_or_else(|| self.mismatch("number")),
            Value::Fn(_) => Err(self.mismatch("number")),
        }
    }

    /// Coerce to text: "true"/"false" for booleans, compact decimal for
    /// numbers (integer values print without a decimal point).
    pub fn to_text(&self) -> ExprResult<String> {
        match self {
            Value::Bool(b) => Ok(writer::format_bool(*b).to_string()),
            Value::Number(n) => Ok(writer::format_number(*n)),
            Value::Str(s) => Ok(s.clone()),
            Value::Fn(_) => Err(self.mismatch("string")),
        }
    }

    /// Coerce this value to the kind of `lhs`, for `==`/`!=`.
    pub fn coerce_to_kind_of(&self, lhs: &Value) -> ExprResult<Value> {
        match lhs {
            Value::Bool(_) => Ok(Value::Bool(self.to_bool()?)),
            Value::Number(_) => Ok(Value::Number(self.to_number()?)),
            Value::Str(_) => Ok(Value::Str(self.to_text()?)),
            Value::Fn(_) => Err(lhs.mismatch("bool, number, or string")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ExprError {
        ExprError::TypeMismatch {
            expected,
            found: writer::format_value(self, StringFormat::SingleQuote),
        }
    }
}

/// Values are equal iff their kinds match and their contents compare
/// equal. Functions compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

/// Full-string decimal parse: `-?digits(.digits)?`, nothing else.
fn parse_decimal(s: &str) -> Option<f64> {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part
        && (frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    s.parse().ok()
}
