//! Expression evaluation: short-circuiting, coercions, and the trace sink.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::context::Context;
use crate::error::{ExprError, ExprResult};
use crate::value::Value;
use crate::writer::{StringFormat, format_value};

/// An ordered sink of human-readable evaluation steps.
///
/// Cloning produces another handle onto the same line buffer, so the
/// sink a caller passes to `reshuffle_async` keeps collecting across
/// later `update` calls. Purely diagnostic: results never depend on
/// whether a sink is attached. Single-threaded, like the engine.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.borrow_mut().push(line.into());
    }

    /// Snapshot of the collected lines in evaluation order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.borrow().join("\n"))
    }
}

/// Trace lines always format values in the default single-quote style.
fn fmt_value(value: &Value) -> String {
    format_value(value, StringFormat::SingleQuote)
}

impl Expr {
    /// Evaluate against a context, optionally narrating each step.
    pub fn evaluate(&self, ctx: &Context, trace: Option<&Trace>) -> ExprResult<Value> {
        match self {
            Expr::Bool(b) => {
                let value = Value::Bool(*b);
                if let Some(t) = trace {
                    t.push(format!("Boolean: {}", fmt_value(&value)));
                }
                Ok(value)
            }
            Expr::Number(n) => {
                let value = Value::Number(*n);
                if let Some(t) = trace {
                    t.push(format!("Number: {}", fmt_value(&value)));
                }
                Ok(value)
            }
            Expr::Str(s) => {
                let value = Value::Str(s.clone());
                if let Some(t) = trace {
                    t.push(format!("String: {}", fmt_value(&value)));
                }
                Ok(value)
            }
            Expr::Variable(name) => {
                let value = ctx
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownVariable(name.clone()))?;
                if !value.is_scalar() {
                    return Err(ExprError::NonScalarValue(name.clone()));
                }
                if let Some(t) = trace {
                    t.push(format!("Fetching variable: {name} -> {}", fmt_value(value)));
                }
                Ok(value.clone())
            }
            Expr::Call { name, args } => {
                let func = match ctx.get(name) {
                    Some(Value::Fn(f)) => f.clone(),
                    Some(_) => return Err(ExprError::NotCallable(name.clone())),
                    None => return Err(ExprError::UnknownVariable(name.clone())),
                };
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(arg.evaluate(ctx, trace)?);
                }
                if arg_values.len() != func.arity() {
                    return Err(ExprError::Arity {
                        name: name.clone(),
                        expected: func.arity(),
                        got: arg_values.len(),
                    });
                }
                let result = func.call(&arg_values)?;
                if !result.is_scalar() {
                    return Err(ExprError::NonScalarReturn(name.clone()));
                }
                if let Some(t) = trace {
                    let formatted: Vec<String> = arg_values.iter().map(fmt_value).collect();
                    t.push(format!(
                        "Called function: {name}({}) = {}",
                        formatted.join(", "),
                        fmt_value(&result)
                    ));
                }
                Ok(result)
            }
            Expr::Unary { op, operand } => {
                let val = operand.evaluate(ctx, trace)?;
                let result = match op {
                    UnaryOp::Not => Value::Bool(!val.to_bool()?),
                    UnaryOp::Neg => Value::Number(-val.to_number()?),
                };
                if let Some(t) = trace {
                    t.push(format!(
                        "Evaluated: {} {} = {}",
                        op.symbol(),
                        fmt_value(&val),
                        fmt_value(&result)
                    ));
                }
                Ok(result)
            }
            Expr::Binary { op, left, right } => {
                let left_val = left.evaluate(ctx, trace)?;
                if let Some(result) = op.short_circuit(&left_val)? {
                    if let Some(t) = trace {
                        t.push(format!(
                            "Evaluated: {} {} (ignore) = {}",
                            fmt_value(&left_val),
                            op.symbol(),
                            fmt_value(&result)
                        ));
                    }
                    return Ok(result);
                }
                let right_val = right.evaluate(ctx, trace)?;
                let result = op.apply(&left_val, &right_val)?;
                if let Some(t) = trace {
                    t.push(format!(
                        "Evaluated: {} {} {} = {}",
                        fmt_value(&left_val),
                        op.symbol(),
                        fmt_value(&right_val),
                        fmt_value(&result)
                    ));
                }
                Ok(result)
            }
        }
    }
}

impl BinaryOp {
    /// The short-circuited result for this left operand, if the
    /// operator short-circuits on it. The right operand is never
    /// evaluated when this returns `Some`.
    ///
    /// `/` shares the multiply rule: a left operand of exactly zero
    /// yields zero without looking at (or zero-checking) the divisor.
    fn short_circuit(self, left: &Value) -> ExprResult<Option<Value>> {
        match self {
            BinaryOp::Or => Ok(left.to_bool()?.then_some(Value::Bool(true))),
            BinaryOp::And => Ok((!left.to_bool()?).then_some(Value::Bool(false))),
            BinaryOp::Mul | BinaryOp::Div => {
                Ok((left.to_number()? == 0.0).then_some(Value::Number(0.0)))
            }
            _ => Ok(None),
        }
    }

    fn apply(self, left: &Value, right: &Value) -> ExprResult<Value> {
        match self {
            BinaryOp::Or => Ok(Value::Bool(left.to_bool()? || right.to_bool()?)),
            BinaryOp::And => Ok(Value::Bool(left.to_bool()? && right.to_bool()?)),
            BinaryOp::Eq => Ok(Value::Bool(*left == right.coerce_to_kind_of(left)?)),
            BinaryOp::Ne => Ok(Value::Bool(*left != right.coerce_to_kind_of(left)?)),
            BinaryOp::Gt => Ok(Value::Bool(left.to_number()? > right.to_number()?)),
            BinaryOp::Lt => Ok(Value::Bool(left.to_number()? < right.to_number()?)),
            BinaryOp::Ge => Ok(Value::Bool(left.to_number()? >= right.to_number()?)),
            BinaryOp::Le => Ok(Value::Bool(left.to_number()? <= right.to_number()?)),
            BinaryOp::Add => Ok(Value::Number(left.to_number()? + right.to_number()?)),
            BinaryOp::Sub => Ok(Value::Number(left.to_number()? - right.to_number()?)),
            BinaryOp::Mul => Ok(Value::Number(left.to_number()? * right.to_number()?)),
            BinaryOp::Div => {
                let divisor = right.to_number()?;
                if divisor == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(Value::Number(left.to_number()? / divisor))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_expression;
    use crate::value::NativeFn;

    fn eval(source: &str, ctx: &Context) -> ExprResult<Value> {
        parse_expression(source).unwrap().evaluate(ctx, None)
    }

    fn eval_empty(source: &str) -> ExprResult<Value> {
        eval(source, &Context::new())
    }

    #[test]
    fn combined_condition() {
        let mut ctx = Context::new();
        ctx.set_fn("get_name", 0, |_| Ok(Value::Str("fred".into())));
        ctx.set("counter", Value::Number(1.0));

        let result = eval("get_name()=='fred' and counter>0 and 5/5.0!=0", &ctx).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn or_and_short_circuit() {
        let mut ctx = Context::new();
        ctx.set("C", Value::Number(15.0));
        ctx.set("D", Value::Bool(false));

        let trace = Trace::new();
        let expr = parse_expression("C>10 or D").unwrap();
        assert_eq!(expr.evaluate(&ctx, Some(&trace)).unwrap(), Value::Bool(true));
        assert_eq!(trace.lines(), vec![
            "Fetching variable: C -> 15",
            "Number: 10",
            "Evaluated: 15 > 10 = true",
            "Evaluated: true or (ignore) = true",
        ]);

        // A true left side does not short-circuit `and`: D is fetched.
        let trace = Trace::new();
        let expr = parse_expression("C>10 and D").unwrap();
        assert_eq!(
            expr.evaluate(&ctx, Some(&trace)).unwrap(),
            Value::Bool(false)
        );
        assert!(trace.lines().iter().any(|l| l.contains("variable: D")));

        // A false left side does: the comparison is never evaluated.
        let trace = Trace::new();
        let expr = parse_expression("D and C>10").unwrap();
        assert_eq!(
            expr.evaluate(&ctx, Some(&trace)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(trace.lines(), vec![
            "Fetching variable: D -> false",
            "Evaluated: false and (ignore) = false",
        ]);
        assert!(!trace.lines().iter().any(|l| l.contains("variable: C")));
    }

    #[test]
    fn and_evaluates_right_when_left_true() {
        let mut ctx = Context::new();
        ctx.set("C", Value::Number(15.0));
        ctx.set("D", Value::Bool(false));
        assert_eq!(eval("C>10 and D", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval("C>10 and not D", &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(matches!(
            eval_empty("5/0"),
            Err(ExprError::DivisionByZero)
        ));
    }

    #[test]
    fn zero_numerator_short_circuits_past_division_by_zero() {
        assert_eq!(eval_empty("5*0/0").unwrap(), Value::Number(0.0));
        assert_eq!(eval_empty("0/0").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn multiply_short_circuits_on_zero_left() {
        let mut ctx = Context::new();
        // boom would fail if evaluated.
        ctx.set_fn("boom", 0, |_| {
            Err(ExprError::NonScalarReturn("boom".into()))
        });
        assert_eq!(eval("0 * boom()", &ctx).unwrap(), Value::Number(0.0));
        assert!(eval("1 * boom()", &ctx).is_err());
    }

    #[test]
    fn arithmetic_and_coercion() {
        assert_eq!(eval_empty("'5' + 2").unwrap(), Value::Number(7.0));
        assert_eq!(eval_empty("5 / 2").unwrap(), Value::Number(2.5));
        assert_eq!(eval_empty("-'3'").unwrap(), Value::Number(-3.0));
        assert_eq!(eval_empty("true + true").unwrap(), Value::Number(2.0));
        assert!(eval_empty("'banana' + 1").is_err());
    }

    #[test]
    fn equality_coerces_right_to_left_kind() {
        let mut ctx = Context::new();
        ctx.set("counter", Value::Number(1.0));
        assert_eq!(eval("counter == '1'", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("counter == true", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("'1' == 1", &ctx).unwrap(), Value::Bool(true));
        assert!(eval("counter == 'fred'", &ctx).is_err());
    }

    #[test]
    fn not_coerces_to_bool() {
        assert_eq!(eval_empty("not '1'").unwrap(), Value::Bool(false));
        assert_eq!(eval_empty("not 0").unwrap(), Value::Bool(true));
        assert_eq!(eval_empty("not not true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn unknown_variable_fails() {
        assert!(matches!(
            eval_empty("missing"),
            Err(ExprError::UnknownVariable(name)) if name == "missing"
        ));
    }

    #[test]
    fn function_arity_is_checked() {
        let mut ctx = Context::new();
        ctx.set_fn("pair", 2, |args| {
            Ok(Value::Number(args[0].to_number()? + args[1].to_number()?))
        });
        assert_eq!(eval("pair(1, 2)", &ctx).unwrap(), Value::Number(3.0));
        assert!(matches!(
            eval("pair(1)", &ctx),
            Err(ExprError::Arity { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn callable_in_value_position_fails() {
        let mut ctx = Context::new();
        ctx.set_fn("f", 0, |_| Ok(Value::Bool(true)));
        assert!(matches!(
            eval("f + 1", &ctx),
            Err(ExprError::NonScalarValue(_))
        ));
    }

    #[test]
    fn value_in_call_position_fails() {
        let mut ctx = Context::new();
        ctx.set("x", Value::Number(1.0));
        assert!(matches!(eval("x()", &ctx), Err(ExprError::NotCallable(_))));
    }

    #[test]
    fn function_must_return_scalar() {
        let mut ctx = Context::new();
        ctx.set_fn("weird", 0, |_| {
            Ok(Value::Fn(NativeFn::new(0, |_| Ok(Value::Bool(true)))))
        });
        assert!(matches!(
            eval("weird()", &ctx),
            Err(ExprError::NonScalarReturn(_))
        ));
    }

    #[test]
    fn call_trace_line() {
        let mut ctx = Context::new();
        ctx.set_fn("whisky", 2, |args| {
            let n = args[1].to_number()?;
            Ok(Value::Str(format!(
                "{}whisky_{}",
                n as i64,
                args[0].to_text()?
            )))
        });
        let trace = Trace::new();
        let expr = parse_expression("whisky('rye', 2)").unwrap();
        expr.evaluate(&ctx, Some(&trace)).unwrap();
        assert!(
            trace
                .lines()
                .contains(&"Called function: whisky('rye', 2) = '2whisky_rye'".to_string())
        );
    }

    #[test]
    fn evaluation_is_pure() {
        let mut ctx = Context::new();
        ctx.set("n", Value::Number(3.0));
        let expr = parse_expression("n * n + 1").unwrap();
        let first = expr.evaluate(&ctx, None).unwrap();
        let second = expr.evaluate(&ctx, None).unwrap();
        assert_eq!(first, second);
    }
}
