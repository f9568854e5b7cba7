//! The resolved expression tree.
//!
//! The resolver has already decided what every identifier means: a primitive
//! call is a [`Expr::Unary`]/[`Expr::Binary`]/[`Expr::Variadic`] node, a special
//! form has its own variant, and everything else is an [`Expr::Apply`] of a
//! [`Expr::Var`]. Trees are immutable; a lambda body is behind an `Rc` so every
//! closure made from it shares one copy.

use std::rc::Rc;

use crate::ast::{NumberType, Syntax};
use crate::builtinops::Primitive;
use crate::numeric::Rational;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Fixnum(NumberType),
    RationalNum(Rational),
    StringLit(Rc<str>),
    Bool(bool),
    /// `(void)`
    MakeVoid,
    /// `(exit)`
    Exit,
    Var(String),
    Unary(Primitive, Box<Expr>),
    Binary(Primitive, Box<Expr>, Box<Expr>),
    Variadic(Primitive, Vec<Expr>),
    /// Quoted syntax, converted to a fresh value on every evaluation
    Quote(Syntax),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Cond(Vec<CondClause>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Lambda(Lambda),
    Apply(Box<Expr>, Vec<Expr>),
    Define(String, Box<Expr>),
    Let(Vec<(String, Expr)>, Box<Expr>),
    Letrec(Vec<(String, Expr)>, Box<Expr>),
    Set(String, Box<Expr>),
    Begin(Vec<Expr>),
}

/// Parameter names and shared body of a `lambda`
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Rc<[String]>,
    pub body: Rc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondClause {
    /// `(else body...)`
    Else(Vec<Expr>),
    /// `(test body...)`; an empty body yields the test value
    Test(Expr, Vec<Expr>),
}

impl Expr {
    /// Whether this expression ends in an explicit `(void)` call, looking
    /// through `begin`, both arms of `if` and the clause bodies of `cond`.
    /// The session uses this to decide whether a void result is printed.
    pub fn is_explicit_void(&self) -> bool {
        match self {
            Expr::MakeVoid => true,
            Expr::Apply(rator, _) => matches!(rator.as_ref(), Expr::Var(name) if name == "void"),
            Expr::Begin(exprs) => exprs.last().is_some_and(Expr::is_explicit_void),
            Expr::If(_, conseq, alter) => conseq.is_explicit_void() || alter.is_explicit_void(),
            Expr::Cond(clauses) => clauses.iter().any(|clause| match clause {
                CondClause::Else(body) | CondClause::Test(_, body) => {
                    body.last().is_some_and(Expr::is_explicit_void)
                }
            }),
            _ => false,
        }
    }
}
