/// Alias for `Result<T, ExprError>`.
pub type ExprResult<T> = Result<T, ExprError>;

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    /// The source text could not be compiled into a tree.
    #[error("parse error: {0}")]
    Parse(String),

    /// A value could not be coerced to the kind an operator requires.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// The kind the operator needed.
        expected: &'static str,
        /// Rendering of the offending value.
        found: String,
    },

    /// The right operand of `/` coerced to zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An identifier is absent from the context.
    #[error("variable not found: \"{0}\"")]
    UnknownVariable(String),

    /// `init` was asked to add a key that already exists.
    #[error("variable already defined: \"{0}\"")]
    AlreadyDefined(String),

    /// A context entry in value position was not a bool, number, or string.
    #[error("variable \"{0}\" must be a bool, number, or string")]
    NonScalarValue(String),

    /// A context entry in call position was not a function.
    #[error("\"{0}\" is not a function")]
    NotCallable(String),

    /// A call supplied the wrong number of arguments.
    #[error("function \"{name}\" expects {expected} argument(s), got {got}")]
    Arity {
        /// The function's context key.
        name: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// A host function returned something other than a scalar.
    #[error("function \"{0}\" must return a bool, number, or string")]
    NonScalarReturn(String),
}
