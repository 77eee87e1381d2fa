//! The evaluation context: named scalars and host functions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Expr;
use crate::error::{ExprError, ExprResult};
use crate::eval::Trace;
use crate::value::{NativeFn, Value};
use crate::writer::{StringFormat, format_value};

/// Right-hand side of a context assignment: a ready scalar, or an
/// expression compiled from a string and evaluated against the current
/// context at assignment time.
#[derive(Debug, Clone)]
pub enum Assignment {
    Literal(Value),
    Expr(Expr),
}

impl Assignment {
    /// Compile an expression-string right-hand side.
    pub fn expr(source: &str) -> ExprResult<Self> {
        Ok(Assignment::Expr(crate::parse_expression(source)?))
    }

    /// Evaluate this right-hand side against the current context.
    pub fn resolve(&self, ctx: &Context, trace: Option<&Trace>) -> ExprResult<Value> {
        match self {
            Assignment::Literal(value) => Ok(value.clone()),
            Assignment::Expr(expr) => expr.evaluate(ctx, trace),
        }
    }

    fn describe(&self) -> String {
        match self {
            Assignment::Literal(value) => format_value(value, StringFormat::SingleQuote),
            Assignment::Expr(expr) => expr.write(),
        }
    }
}

impl From<Value> for Assignment {
    fn from(value: Value) -> Self {
        Assignment::Literal(value)
    }
}

/// Mapping from identifier to [`Value`], with checked init/update
/// primitives. Insertion order is remembered so dumps and bulk applies
/// are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Context {
    keys: Vec<String>,
    vars: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Host-facing set: inserts or overwrites without the init/update
    /// existence checks.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !self.vars.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.vars.insert(key, value);
    }

    /// Register a host function of fixed arity.
    pub fn set_fn<F>(&mut self, key: impl Into<String>, arity: usize, func: F)
    where
        F: Fn(&[Value]) -> ExprResult<Value> + 'static,
    {
        self.set(key, Value::Fn(NativeFn::new(arity, func)));
    }

    /// Evaluate the right-hand side and add a new entry. Fails with
    /// [`ExprError::AlreadyDefined`] if the key exists.
    pub fn init(&mut self, key: &str, rhs: &Assignment, trace: Option<&Trace>) -> ExprResult<()> {
        if let Some(t) = trace {
            t.push(format!("InitContext: Evaluating {key} = {}", rhs.describe()));
        }
        let value = rhs.resolve(self, trace)?;
        if self.contains(key) {
            return Err(ExprError::AlreadyDefined(key.to_string()));
        }
        self.set(key, value);
        Ok(())
    }

    /// Evaluate the right-hand side and overwrite an existing entry.
    /// Fails with [`ExprError::UnknownVariable`] if the key is missing.
    pub fn update(&mut self, key: &str, rhs: &Assignment, trace: Option<&Trace>) -> ExprResult<()> {
        if let Some(t) = trace {
            t.push(format!(
                "UpdateContext: Evaluating {key} = {}",
                rhs.describe()
            ));
        }
        let value = rhs.resolve(self, trace)?;
        match self.vars.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ExprError::UnknownVariable(key.to_string())),
        }
    }

    /// Apply a list of assignments through [`Context::init`], in order.
    pub fn init_all(
        &mut self,
        entries: &[(String, Assignment)],
        trace: Option<&Trace>,
    ) -> ExprResult<()> {
        for (key, rhs) in entries {
            self.init(key, rhs, trace)?;
        }
        Ok(())
    }

    /// Apply a list of assignments through [`Context::update`], in order.
    pub fn update_all(
        &mut self,
        entries: &[(String, Assignment)],
        trace: Option<&Trace>,
    ) -> ExprResult<()> {
        for (key, rhs) in entries {
            self.update(key, rhs, trace)?;
        }
        Ok(())
    }

    /// Debug listing of the entries in insertion order.
    pub fn dump(&self) -> String {
        let mut lines = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            if let Some(value) = self.vars.get(key) {
                lines.push(format!(
                    "{key} = {}",
                    format_value(value, StringFormat::SingleQuote)
                ));
            }
        }
        lines.join("\n")
    }
}

/// A context handle shareable between several decks and the host.
///
/// Single-threaded: host functions must not re-borrow the shared
/// context while an update batch is applying.
pub type SharedContext = Rc<RefCell<Context>>;

impl Context {
    /// Wrap into a [`SharedContext`] handle.
    pub fn into_shared(self) -> SharedContext {
        Rc::new(RefCell::new(self))
    }
}
