//! Built-in operations registry: primitives and reserved words.
//!
//! The table is built once per session ([`Builtins::new`]) and handed to the
//! resolver and evaluator by reference. It answers two questions:
//!
//! - does a name denote a **primitive** (`+`, `car`, `list?`, ...)? The resolver
//!   then builds a dedicated primitive node, and the evaluator can reify the
//!   name into a first-class procedure when it appears free;
//! - does a name denote a **special form** (`if`, `lambda`, `define`, ...)? The
//!   resolver then validates the form's shape and builds its node.
//!
//! Either kind of name is reserved: it cannot be redefined with `define`,
//! although a lexical binder (`lambda` parameter, `let` name) may shadow it.
//!
//! ## Adding a new primitive
//!
//! 1. Add a variant to [`Primitive`] and give it a name and an [`Arity`]
//! 2. Add it to the registry in [`Builtins::new`]
//! 3. Implement it in [`apply_unary`], [`apply_binary`] or [`apply_variadic`]
//! 4. Add tests covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Pair, Value};
use crate::numeric::{self, Comparison};

/// Argument count accepted by a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Any => true,
        }
    }

    /// Check `count` against this arity, naming `context` in the error
    pub fn validate(self, context: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(context, self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Every primitive operation the evaluator knows natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Add,
    Sub,
    Mul,
    Div,
    Modulo,
    Expt,
    Lt,
    Le,
    NumEq,
    Ge,
    Gt,
    Cons,
    Car,
    Cdr,
    SetCar,
    SetCdr,
    List,
    IsList,
    IsEq,
    Not,
    IsBoolean,
    IsNumber,
    IsNull,
    IsPair,
    IsProcedure,
    IsSymbol,
    IsString,
    Display,
    Void,
    Exit,
    And,
    Or,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Add => "+",
            Primitive::Sub => "-",
            Primitive::Mul => "*",
            Primitive::Div => "/",
            Primitive::Modulo => "modulo",
            Primitive::Expt => "expt",
            Primitive::Lt => "<",
            Primitive::Le => "<=",
            Primitive::NumEq => "=",
            Primitive::Ge => ">=",
            Primitive::Gt => ">",
            Primitive::Cons => "cons",
            Primitive::Car => "car",
            Primitive::Cdr => "cdr",
            Primitive::SetCar => "set-car!",
            Primitive::SetCdr => "set-cdr!",
            Primitive::List => "list",
            Primitive::IsList => "list?",
            Primitive::IsEq => "eq?",
            Primitive::Not => "not",
            Primitive::IsBoolean => "boolean?",
            Primitive::IsNumber => "number?",
            Primitive::IsNull => "null?",
            Primitive::IsPair => "pair?",
            Primitive::IsProcedure => "procedure?",
            Primitive::IsSymbol => "symbol?",
            Primitive::IsString => "string?",
            Primitive::Display => "display",
            Primitive::Void => "void",
            Primitive::Exit => "exit",
            Primitive::And => "and",
            Primitive::Or => "or",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Primitive::Add | Primitive::Mul | Primitive::List | Primitive::And | Primitive::Or => {
                Arity::Any
            }
            Primitive::Sub | Primitive::Div => Arity::AtLeast(1),
            Primitive::Lt | Primitive::Le | Primitive::NumEq | Primitive::Ge | Primitive::Gt => {
                Arity::AtLeast(2)
            }
            Primitive::Modulo
            | Primitive::Expt
            | Primitive::Cons
            | Primitive::SetCar
            | Primitive::SetCdr
            | Primitive::IsEq => Arity::Exact(2),
            Primitive::Void | Primitive::Exit => Arity::Exact(0),
            Primitive::Car
            | Primitive::Cdr
            | Primitive::IsList
            | Primitive::Not
            | Primitive::IsBoolean
            | Primitive::IsNumber
            | Primitive::IsNull
            | Primitive::IsPair
            | Primitive::IsProcedure
            | Primitive::IsSymbol
            | Primitive::IsString
            | Primitive::Display => Arity::Exact(1),
        }
    }

    /// The comparison operator behind `< <= = >= >`
    pub fn comparison(self) -> Option<Comparison> {
        match self {
            Primitive::Lt => Some(Comparison::Lt),
            Primitive::Le => Some(Comparison::Le),
            Primitive::NumEq => Some(Comparison::Eq),
            Primitive::Ge => Some(Comparison::Ge),
            Primitive::Gt => Some(Comparison::Gt),
            _ => None,
        }
    }

    /// Number of parameters a reified closure for this primitive takes.
    /// Variadic arithmetic and comparison reify as their binary form;
    /// `list`, `and` and `or` have no fixed shape and cannot be reified.
    pub fn reified_arity(self) -> Option<usize> {
        match self {
            Primitive::List | Primitive::And | Primitive::Or => None,
            Primitive::Add | Primitive::Mul | Primitive::Sub | Primitive::Div => Some(2),
            other => match other.arity() {
                Arity::Exact(n) => Some(n),
                Arity::AtLeast(n) => Some(n),
                Arity::Any => None,
            },
        }
    }
}

/// Reserved words with their own evaluation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    Quote,
    If,
    Cond,
    Lambda,
    Define,
    Let,
    Letrec,
    Set,
    Begin,
}

impl SpecialForm {
    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::If => "if",
            SpecialForm::Cond => "cond",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Define => "define",
            SpecialForm::Let => "let",
            SpecialForm::Letrec => "letrec",
            SpecialForm::Set => "set!",
            SpecialForm::Begin => "begin",
        }
    }
}

/// Represents the meaning of a built-in name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Primitive(Primitive),
    SpecialForm(SpecialForm),
}

/// Definition of a built-in name
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub scheme_id: &'static str,
    pub op_kind: OpKind,
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }
}

/// Lookup table of primitives and reserved words, immutable once built.
#[derive(Debug, Clone)]
pub struct Builtins {
    ops: Vec<BuiltinOp>,
    by_name: HashMap<&'static str, usize>,
}

const PRIMITIVES: &[Primitive] = &[
    Primitive::Add,
    Primitive::Sub,
    Primitive::Mul,
    Primitive::Div,
    Primitive::Modulo,
    Primitive::Expt,
    Primitive::Lt,
    Primitive::Le,
    Primitive::NumEq,
    Primitive::Ge,
    Primitive::Gt,
    Primitive::Cons,
    Primitive::Car,
    Primitive::Cdr,
    Primitive::SetCar,
    Primitive::SetCdr,
    Primitive::List,
    Primitive::IsList,
    Primitive::IsEq,
    Primitive::Not,
    Primitive::IsBoolean,
    Primitive::IsNumber,
    Primitive::IsNull,
    Primitive::IsPair,
    Primitive::IsProcedure,
    Primitive::IsSymbol,
    Primitive::IsString,
    Primitive::Display,
    Primitive::Void,
    Primitive::Exit,
    Primitive::And,
    Primitive::Or,
];

const SPECIAL_FORMS: &[SpecialForm] = &[
    SpecialForm::Quote,
    SpecialForm::If,
    SpecialForm::Cond,
    SpecialForm::Lambda,
    SpecialForm::Define,
    SpecialForm::Let,
    SpecialForm::Letrec,
    SpecialForm::Set,
    SpecialForm::Begin,
];

impl Builtins {
    pub fn new() -> Self {
        let ops: Vec<BuiltinOp> = PRIMITIVES
            .iter()
            .map(|&p| BuiltinOp {
                scheme_id: p.name(),
                op_kind: OpKind::Primitive(p),
            })
            .chain(SPECIAL_FORMS.iter().map(|&s| BuiltinOp {
                scheme_id: s.name(),
                op_kind: OpKind::SpecialForm(s),
            }))
            .collect();
        let by_name = ops
            .iter()
            .enumerate()
            .map(|(i, op)| (op.scheme_id, i))
            .collect();
        Builtins { ops, by_name }
    }

    pub fn ops(&self) -> &[BuiltinOp] {
        &self.ops
    }

    /// Find a builtin by its Scheme identifier
    pub fn find(&self, name: &str) -> Option<&BuiltinOp> {
        self.by_name.get(name).map(|&i| &self.ops[i])
    }

    pub fn primitive(&self, name: &str) -> Option<Primitive> {
        match self.find(name)?.op_kind {
            OpKind::Primitive(p) => Some(p),
            OpKind::SpecialForm(_) => None,
        }
    }

    pub fn special_form(&self, name: &str) -> Option<SpecialForm> {
        match self.find(name)?.op_kind {
            OpKind::SpecialForm(s) => Some(s),
            OpKind::Primitive(_) => None,
        }
    }

    /// Primitive or reserved word; such names cannot be redefined
    pub fn is_reserved(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

//
// Builtin Function Implementations
//

fn expect_pair<'a>(value: &'a Value, op: &str) -> Result<&'a Rc<Pair>, Error> {
    match value {
        Value::Pair(pair) => Ok(pair),
        other => Err(Error::type_error(format!(
            "{op} expects a pair, got {} {other}",
            other.type_name()
        ))),
    }
}

fn not_shaped(prim: Primitive, shape: &str) -> Error {
    Error::EvalError(format!("{} cannot be applied as a {shape} primitive", prim.name()))
}

/// Apply a one-operand primitive. `display` writes to `out`.
pub fn apply_unary(prim: Primitive, arg: &Value, out: &mut dyn Write) -> Result<Value, Error> {
    let result = match prim {
        Primitive::Car => expect_pair(arg, "car")?.car(),
        Primitive::Cdr => expect_pair(arg, "cdr")?.cdr(),
        Primitive::Not => Value::Boolean(!arg.is_true()),
        Primitive::IsList => Value::Boolean(arg.is_list()),
        Primitive::IsBoolean => Value::Boolean(matches!(arg, Value::Boolean(_))),
        Primitive::IsNumber => Value::Boolean(arg.is_number()),
        Primitive::IsNull => Value::Boolean(matches!(arg, Value::Null)),
        Primitive::IsPair => Value::Boolean(matches!(arg, Value::Pair(_))),
        Primitive::IsProcedure => Value::Boolean(matches!(arg, Value::Procedure(_))),
        Primitive::IsSymbol => Value::Boolean(matches!(arg, Value::Symbol(_))),
        Primitive::IsString => Value::Boolean(matches!(arg, Value::String(_))),
        Primitive::Display => {
            let written = match arg {
                Value::String(s) => write!(out, "{s}"),
                other => write!(out, "{other}"),
            };
            written.map_err(|e| Error::EvalError(format!("display failed: {e}")))?;
            Value::Void
        }
        Primitive::Sub => numeric::negate(arg)?,
        Primitive::Div => numeric::reciprocal(arg)?,
        other => return Err(not_shaped(other, "unary")),
    };
    Ok(result)
}

/// Apply a two-operand primitive
pub fn apply_binary(prim: Primitive, a: &Value, b: &Value) -> Result<Value, Error> {
    if let Some(comparison) = prim.comparison() {
        return Ok(Value::Boolean(comparison.apply(a, b)?));
    }
    let result = match prim {
        Primitive::Add => numeric::add(a, b)?,
        Primitive::Sub => numeric::sub(a, b)?,
        Primitive::Mul => numeric::mul(a, b)?,
        Primitive::Div => numeric::div(a, b)?,
        Primitive::Modulo => numeric::modulo(a, b)?,
        Primitive::Expt => numeric::expt(a, b)?,
        Primitive::Cons => Value::cons(a.clone(), b.clone()),
        Primitive::SetCar => {
            expect_pair(a, "set-car!")?.set_car(b.clone());
            Value::Void
        }
        Primitive::SetCdr => {
            expect_pair(a, "set-cdr!")?.set_cdr(b.clone());
            Value::Void
        }
        Primitive::IsEq => Value::Boolean(a.is_eq(b)),
        other => return Err(not_shaped(other, "binary")),
    };
    Ok(result)
}

/// Apply an n-ary primitive to already evaluated operands
pub fn apply_variadic(prim: Primitive, args: &[Value]) -> Result<Value, Error> {
    if let Some(comparison) = prim.comparison() {
        prim.arity().validate(prim.name(), args.len())?;
        return Ok(Value::Boolean(comparison.apply_chain(args)?));
    }
    match prim {
        Primitive::Add => numeric::add_all(args),
        Primitive::Sub => numeric::sub_all(args),
        Primitive::Mul => numeric::mul_all(args),
        Primitive::Div => numeric::div_all(args),
        Primitive::List => Ok(Value::list(args.to_vec())),
        other => Err(not_shaped(other, "variadic")),
    }
}
