//! Core data types: the raw [`Syntax`] tree handed over by the reader and the
//! runtime [`Value`] produced by evaluation.
//!
//! Pairs and procedures are reference-counted cells. Cloning a [`Value`] that
//! holds one of them clones the handle, not the contents, so two variables can
//! alias the same pair and observe each other's `set-car!`/`set-cdr!`. That
//! sharing is part of the language semantics.
//!
//! Small helpers ([`val`], [`sym`], [`nil`]) and `From` conversions make it easy
//! to build expected values in tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::environment::Environment;
use crate::expr::Expr;
use crate::numeric::Rational;

/// Type alias for fixnums in the interpreter
pub(crate) type NumberType = i32;

/// Raw syntax tree produced by the reader, before any meaning is resolved.
///
/// A dot in `(a . b)` is kept as the symbol `"."` inside the list; only quote
/// conversion gives it a meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Integer(NumberType),
    Rational(NumberType, NumberType),
    String(String),
    Bool(bool),
    Symbol(String),
    List(Vec<Syntax>),
}

impl Syntax {
    /// Symbol name, if this node is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Syntax::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn is_dot(&self) -> bool {
        matches!(self, Syntax::Symbol(s) if s == ".")
    }

    /// Split list items at a dot token: `(a b . c)` gives `([a, b], Some(c))`.
    ///
    /// The dot may appear once, never first, and must be followed by exactly
    /// one element.
    pub(crate) fn split_dotted(items: &[Syntax]) -> Result<(&[Syntax], Option<&Syntax>), Error> {
        match items.iter().position(Syntax::is_dot) {
            None => Ok((items, None)),
            Some(pos) if pos > 0 && pos + 2 == items.len() && !items[pos + 1].is_dot() => {
                Ok((&items[..pos], Some(&items[pos + 1])))
            }
            Some(_) => Err(Error::syntax(format!(
                "bad dot notation in quoted list {}",
                Syntax::List(items.to_vec())
            ))),
        }
    }

    /// Check dot placement through a whole quoted datum
    pub(crate) fn validate_quoted(&self) -> Result<(), Error> {
        if let Syntax::List(items) = self {
            let (proper, tail) = Syntax::split_dotted(items)?;
            for item in proper.iter().chain(tail) {
                item.validate_quoted()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Syntax::Integer(n) => write!(f, "{n}"),
            Syntax::Rational(n, d) => write!(f, "{n}/{d}"),
            Syntax::String(s) => write_escaped(f, s),
            Syntax::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Syntax::Symbol(s) => write!(f, "{s}"),
            Syntax::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A mutable cons cell. Both slots can be replaced independently.
pub struct Pair {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
}

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Self {
        Pair {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
        }
    }

    pub fn car(&self) -> Value {
        self.car.borrow().clone()
    }

    pub fn cdr(&self) -> Value {
        self.cdr.borrow().clone()
    }

    pub fn set_car(&self, value: Value) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: Value) {
        *self.cdr.borrow_mut() = value;
    }
}

/// A closure: parameter names, a shared body and the environment captured at
/// creation time.
pub struct Procedure {
    pub params: Rc<[String]>,
    pub body: Rc<Expr>,
    pub env: Environment,
}

/// Runtime values.
#[derive(Clone)]
pub enum Value {
    Integer(NumberType),
    Rational(Rational),
    Boolean(bool),
    String(Rc<str>),
    Symbol(Rc<str>),
    /// The empty list
    Null,
    /// Result of forms evaluated for effect (`define`, `set!`, `display`, ...)
    Void,
    Pair(Rc<Pair>),
    Procedure(Rc<Procedure>),
    /// Produced by `(exit)`; tells the driver to end the session
    Terminate,
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Pair::new(car, cdr)))
    }

    /// Build a proper list, right to left
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Null, |tail, item| Value::cons(item, tail))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    /// Only `#f` is false
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Rational(_))
    }

    /// Short name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Rational(_) => "rational",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Null => "null",
            Value::Void => "void",
            Value::Pair(_) => "pair",
            Value::Procedure(_) => "procedure",
            Value::Terminate => "terminate",
        }
    }

    /// `eq?`: by value for integers, booleans and symbols, trivially true for
    /// two nulls or two voids, by identity for everything that lives in a cell.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Terminate, Value::Terminate) => true,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            // Rationals are plain values here; identical representation stands in for identity
            (Value::Rational(a), Value::Rational(b)) => a == b,
            _ => false,
        }
    }

    /// `list?`: Floyd cycle detection over the cdr chain. A circular chain is
    /// not a list.
    pub fn is_list(&self) -> bool {
        let mut slow = self.clone();
        let mut fast = self.clone();
        loop {
            fast = match fast {
                Value::Null => return true,
                Value::Pair(p) => p.cdr(),
                _ => return false,
            };
            fast = match fast {
                Value::Null => return true,
                Value::Pair(p) => p.cdr(),
                _ => return false,
            };
            slow = match slow {
                Value::Pair(p) => p.cdr(),
                other => other,
            };
            if let (Value::Pair(a), Value::Pair(b)) = (&slow, &fast)
                && Rc::ptr_eq(a, b)
            {
                return false;
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Rational(r) => write!(f, "Rational({}/{})", r.num(), r.den()),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Null => write!(f, "Null"),
            Value::Void => write!(f, "Void"),
            Value::Pair(_) => write!(f, "Pair{self}"),
            Value::Procedure(p) => write!(f, "Procedure(params={:?})", &p.params[..]),
            Value::Terminate => write!(f, "Terminate"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Integer(n)
    }
}

impl From<Rational> for Value {
    fn from(r: Rational) -> Self {
        Value::Rational(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

/// Helper function for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Null
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

/// Print a value, remembering the pairs on the current path so that cyclic
/// structure prints `...` instead of recursing forever.
fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, path: &mut Vec<*const Pair>) -> fmt::Result {
    match value {
        Value::Integer(n) => write!(f, "{n}"),
        Value::Rational(r) => write!(f, "{r}"),
        Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
        Value::String(s) => write_escaped(f, s),
        Value::Symbol(s) => write!(f, "{s}"),
        Value::Null => write!(f, "()"),
        Value::Void => write!(f, "#<void>"),
        Value::Procedure(_) => write!(f, "#<procedure>"),
        Value::Terminate => write!(f, "#<terminate>"),
        Value::Pair(first) => {
            if path.contains(&Rc::as_ptr(first)) {
                return write!(f, "...");
            }
            let mark = path.len();
            path.push(Rc::as_ptr(first));
            write!(f, "(")?;
            write_value(f, &first.car(), path)?;
            let mut rest = first.cdr();
            loop {
                match rest {
                    Value::Null => break,
                    Value::Pair(p) => {
                        if path.contains(&Rc::as_ptr(&p)) {
                            write!(f, " . ...")?;
                            break;
                        }
                        path.push(Rc::as_ptr(&p));
                        write!(f, " ")?;
                        write_value(f, &p.car(), path)?;
                        rest = p.cdr();
                    }
                    other => {
                        write!(f, " . ")?;
                        write_value(f, &other, path)?;
                        break;
                    }
                }
            }
            path.truncate(mark);
            write!(f, ")")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

/// Structural equality, used by tests and by `Syntax`-to-`Value` checks.
/// Procedures compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Null, Value::Null)
            | (Value::Void, Value::Void)
            | (Value::Terminate, Value::Terminate) => true,
            (Value::Pair(a), Value::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.car() == b.car() && a.cdr() == b.cdr())
            }
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
