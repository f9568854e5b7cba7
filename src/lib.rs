//! schemecore - resolver and evaluator core for a small Scheme dialect
//!
//! The crate turns a raw syntax tree into a resolved expression tree and runs it
//! against a chained environment of shared, mutable binding cells.
//!
//! ```scheme
//! (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
//! (fact 5)                      ; 120
//! (+ 1/2 1/3)                   ; 5/6, exact and unreduced
//! (let ((p (cons 1 2)))
//!   (set-car! p 9)
//!   (car p))                    ; 9
//! ```
//!
//! ## Pipeline
//!
//! text → [`scheme`] reader → [`ast::Syntax`] → [`resolver`] → [`expr::Expr`]
//! → [`evaluator`] → [`ast::Value`]
//!
//! The resolver needs the *current* environment so that a lexical binding can
//! shadow a primitive or reserved name. The evaluator mutates the environment
//! handle it is given when it runs a `define`.
//!
//! ## Semantics worth knowing
//!
//! - Numbers are exact: 32-bit integers and rationals. Integer division always
//!   yields a rational, and rationals are never reduced to lowest terms (only
//!   the sign is normalized into the numerator).
//! - Every integer step is overflow-checked; overflow is an error, never a wrap.
//! - Only `#f` is false.
//! - Pairs and closures are shared: `set-car!` through one alias is visible
//!   through every other.
//! - There is no tail-call elimination. Recursion runs on the host stack and is
//!   cut off by a configurable depth guard (see [`InterpreterConfig`]).
//!
//! ## Modules
//!
//! - `ast`: runtime values and the raw syntax tree
//! - `environment`: chained frames of shared binding cells
//! - `numeric`: the exact integer/rational tower
//! - `expr`: the resolved expression tree
//! - `builtinops`: primitive and reserved-word registry
//! - `resolver`: syntax → expression resolution
//! - `evaluator`: expression evaluation
//! - `scheme`: text → syntax reader
//! - `session`: top-level driver (define batching, printing)

use thiserror::Error;

/// Maximum reader nesting depth, used when no [`scheme::ParseConfig`] is supplied.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum evaluation nesting depth, used when no [`InterpreterConfig`] is supplied.
///
/// Every nested `eval` counts one level; a procedure call takes about three.
/// The limit keeps deep non-tail recursion from overflowing a 2 MB thread
/// stack in an unoptimized build. Raise it through [`InterpreterConfig`] when
/// running on a larger stack.
pub const MAX_EVAL_DEPTH: usize = 128;

/// Errors raised by the reader, resolver and evaluator.
///
/// All of them are "runtime errors" from the point of view of a session: they
/// unwind straight to the driver, which reports them and carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("SyntaxError: {0}")]
    SyntaxError(String),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("ArityError: {context}: expected {expected} arguments, got {got}")]
    ArityError {
        expected: String,
        got: usize,
        context: String,
    },
    #[error("Division by zero in {0}")]
    DivisionByZero(&'static str),
    #[error("Domain error: {0}")]
    DomainError(String),
    #[error("Integer overflow in {0}")]
    Overflow(&'static str),
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

impl Error {
    /// Create an ArityError for a named form or procedure
    pub fn arity_error(context: impl Into<String>, expected: impl ToString, got: usize) -> Self {
        Error::ArityError {
            expected: expected.to_string(),
            got,
            context: context.into(),
        }
    }

    /// Create a SyntaxError from a message
    pub fn syntax(message: impl Into<String>) -> Self {
        Error::SyntaxError(message.into())
    }

    /// Create a TypeError from a message
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tunables for an interpreter session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpreterConfig {
    /// Nested evaluation levels allowed before an error is raised
    pub max_eval_depth: usize,
    /// Reader settings
    pub parse: scheme::ParseConfig,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_eval_depth: MAX_EVAL_DEPTH,
            parse: scheme::ParseConfig::default(),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod expr;
pub mod numeric;
pub mod resolver;
pub mod scheme;
pub mod session;

pub use ast::{Syntax, Value};
pub use builtinops::Builtins;
pub use environment::Environment;
pub use evaluator::{EvalContext, eval};
pub use expr::Expr;
pub use resolver::resolve;
pub use session::{Outcome, Session};
