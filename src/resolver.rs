//! Resolution: raw [`Syntax`] to an [`Expr`] tree.
//!
//! Every list form is classified by its head. A head symbol that is bound in
//! the current lexical environment always means an application, so a binder
//! can shadow a primitive or reserved name. Otherwise the builtin registry
//! decides: primitives get a dedicated node specialized by operand count,
//! reserved words get their shape checked here rather than at run time.
//!
//! Binder forms thread a resolution-time [`Environment`] through nested forms.
//! Names are added as placeholders; their cells are never read.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::Syntax;
use crate::builtinops::{Arity, Builtins, Primitive, SpecialForm};
use crate::environment::Environment;
use crate::expr::{CondClause, Expr, Lambda};
use crate::numeric::Rational;
use crate::{Error, Result};

/// Resolve `syntax` against the current environment.
///
/// Pass the environment the expression will be evaluated in, so shadowing
/// decisions match run-time bindings.
pub fn resolve(syntax: &Syntax, env: &Environment, builtins: &Builtins) -> Result<Expr> {
    Resolver { builtins }.resolve(syntax, env)
}

struct Resolver<'a> {
    builtins: &'a Builtins,
}

impl Resolver<'_> {
    fn resolve(&self, syntax: &Syntax, env: &Environment) -> Result<Expr> {
        match syntax {
            Syntax::Integer(n) => Ok(Expr::Fixnum(*n)),
            Syntax::Rational(n, d) => Ok(Expr::RationalNum(Rational::try_new(*n, *d)?)),
            Syntax::String(s) => Ok(Expr::StringLit(Rc::from(s.as_str()))),
            Syntax::Bool(b) => Ok(Expr::Bool(*b)),
            Syntax::Symbol(name) => Ok(Expr::Var(name.clone())),
            Syntax::List(items) => self.resolve_list(items, env),
        }
    }

    fn resolve_list(&self, items: &[Syntax], env: &Environment) -> Result<Expr> {
        let Some((head, operands)) = items.split_first() else {
            return Ok(Expr::Quote(Syntax::List(Vec::new())));
        };
        if let Some(op) = head.as_symbol()
            && !env.contains(op)
        {
            if let Some(prim) = self.builtins.primitive(op) {
                return self.resolve_primitive(prim, operands, env);
            }
            if let Some(form) = self.builtins.special_form(op) {
                return self.resolve_special_form(form, operands, env);
            }
        }
        let rator = self.resolve(head, env)?;
        let rands = self.resolve_all(operands, env)?;
        Ok(Expr::Apply(Box::new(rator), rands))
    }

    fn resolve_all(&self, items: &[Syntax], env: &Environment) -> Result<Vec<Expr>> {
        items.iter().map(|item| self.resolve(item, env)).collect()
    }

    /// Build a primitive node: binary for exactly two operands, the operand
    /// itself for `(+ x)` and `(* x)`, n-ary otherwise
    fn resolve_primitive(&self, prim: Primitive, operands: &[Syntax], env: &Environment) -> Result<Expr> {
        prim.arity().validate(prim.name(), operands.len())?;
        let args = self.resolve_all(operands, env)?;

        match prim {
            Primitive::And => return Ok(Expr::And(args)),
            Primitive::Or => return Ok(Expr::Or(args)),
            Primitive::List => return Ok(Expr::Variadic(prim, args)),
            Primitive::Void => return Ok(Expr::MakeVoid),
            Primitive::Exit => return Ok(Expr::Exit),
            _ => {}
        }
        let args = match <[Expr; 1]>::try_from(args) {
            Ok([only]) if matches!(prim, Primitive::Add | Primitive::Mul) => return Ok(only),
            Ok([only]) if prim.arity() == Arity::Exact(1) => {
                return Ok(Expr::Unary(prim, Box::new(only)));
            }
            Ok(one) => Vec::from(one),
            Err(args) => args,
        };
        match <[Expr; 2]>::try_from(args) {
            Ok([a, b]) => Ok(Expr::Binary(prim, Box::new(a), Box::new(b))),
            Err(args) => Ok(Expr::Variadic(prim, args)),
        }
    }

    fn resolve_special_form(&self, form: SpecialForm, operands: &[Syntax], env: &Environment) -> Result<Expr> {
        match form {
            SpecialForm::Quote => {
                let [datum] = operands else {
                    return Err(shape_error("quote", "exactly 1 operand", operands.len()));
                };
                datum.validate_quoted()?;
                Ok(Expr::Quote(datum.clone()))
            }
            SpecialForm::If => {
                let [test, conseq, alter] = operands else {
                    return Err(shape_error("if", "exactly 3 operands", operands.len()));
                };
                Ok(Expr::If(
                    Box::new(self.resolve(test, env)?),
                    Box::new(self.resolve(conseq, env)?),
                    Box::new(self.resolve(alter, env)?),
                ))
            }
            SpecialForm::Cond => self.resolve_cond(operands, env),
            SpecialForm::Lambda => {
                let Some((params, body)) = operands.split_first() else {
                    return Err(shape_error("lambda", "a parameter list and a body", 0));
                };
                let params = symbol_list(params, "lambda parameter")?;
                Ok(Expr::Lambda(self.resolve_lambda(params, body, env, "lambda")?))
            }
            SpecialForm::Define => self.resolve_define(operands, env),
            SpecialForm::Let => {
                let (bindings, body) = binding_form("let", operands)?;
                let inits = self.resolve_bindings(&bindings, env)?;
                let body_env = extend_all(env, &bindings);
                let body = self.resolve_body(body, &body_env, "let")?;
                Ok(Expr::Let(inits, Box::new(body)))
            }
            SpecialForm::Letrec => {
                let (bindings, body) = binding_form("letrec", operands)?;
                let rec_env = extend_all(env, &bindings);
                let inits = self.resolve_bindings(&bindings, &rec_env)?;
                let body = self.resolve_body(body, &rec_env, "letrec")?;
                Ok(Expr::Letrec(inits, Box::new(body)))
            }
            SpecialForm::Set => {
                let [target, value] = operands else {
                    return Err(shape_error("set!", "exactly 2 operands", operands.len()));
                };
                let name = target
                    .as_symbol()
                    .ok_or_else(|| Error::syntax(format!("set!: expected a variable name, got {target}")))?;
                Ok(Expr::Set(name.to_owned(), Box::new(self.resolve(value, env)?)))
            }
            SpecialForm::Begin => Ok(Expr::Begin(self.resolve_all(operands, env)?)),
        }
    }

    fn resolve_cond(&self, clauses: &[Syntax], env: &Environment) -> Result<Expr> {
        if clauses.is_empty() {
            return Err(shape_error("cond", "at least 1 clause", 0));
        }
        let clauses = clauses
            .iter()
            .map(|clause| {
                let Syntax::List(parts) = clause else {
                    return Err(Error::syntax(format!("cond: clause must be a list, got {clause}")));
                };
                match parts.split_first() {
                    None => Err(Error::syntax("cond: empty clause")),
                    Some((Syntax::Symbol(head), body)) if head == "else" => {
                        if body.is_empty() {
                            return Err(Error::syntax("cond: else clause needs a body"));
                        }
                        Ok(CondClause::Else(self.resolve_all(body, env)?))
                    }
                    Some((test, body)) => Ok(CondClause::Test(
                        self.resolve(test, env)?,
                        self.resolve_all(body, env)?,
                    )),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Expr::Cond(clauses))
    }

    /// `(define name expr)` or `(define (name params...) body...)`
    fn resolve_define(&self, operands: &[Syntax], env: &Environment) -> Result<Expr> {
        match operands {
            [Syntax::Symbol(name), value] => {
                self.check_definable(name)?;
                Ok(Expr::Define(name.clone(), Box::new(self.resolve(value, env)?)))
            }
            [Syntax::Symbol(_), ..] => Err(shape_error("define", "a name and exactly 1 value", operands.len())),
            [Syntax::List(signature), body @ ..] => {
                let Some((name, params)) = signature.split_first() else {
                    return Err(Error::syntax("define: empty signature"));
                };
                let name = name
                    .as_symbol()
                    .ok_or_else(|| Error::syntax(format!("define: expected a procedure name, got {name}")))?;
                self.check_definable(name)?;
                let params = params
                    .iter()
                    .map(|param| symbol_name(param, "define parameter"))
                    .collect::<Result<Vec<_>>>()?;
                let lambda = self.resolve_lambda(params, body, env, name)?;
                Ok(Expr::Define(name.to_owned(), Box::new(Expr::Lambda(lambda))))
            }
            [other, ..] => Err(Error::syntax(format!("define: expected a name, got {other}"))),
            [] => Err(shape_error("define", "a name and a value", 0)),
        }
    }

    fn check_definable(&self, name: &str) -> Result<()> {
        if self.builtins.is_reserved(name) {
            return Err(Error::syntax(format!("cannot redefine builtin '{name}'")));
        }
        Ok(())
    }

    fn resolve_lambda(&self, params: Vec<&str>, body: &[Syntax], env: &Environment, context: &str) -> Result<Lambda> {
        check_unique(&params, context)?;
        let body_env = params
            .iter()
            .fold(env.clone(), |scope, param| scope.extend_placeholder(*param));
        let body = self.resolve_body(body, &body_env, context)?;
        Ok(Lambda {
            params: params.into_iter().map(str::to_owned).collect(),
            body: Rc::new(body),
        })
    }

    /// A body of one or more forms; several forms become a `begin`
    fn resolve_body(&self, body: &[Syntax], env: &Environment, context: &str) -> Result<Expr> {
        match body {
            [] => Err(Error::syntax(format!("{context}: body must not be empty"))),
            [single] => self.resolve(single, env),
            many => Ok(Expr::Begin(self.resolve_all(many, env)?)),
        }
    }

    fn resolve_bindings(&self, bindings: &[(&str, &Syntax)], env: &Environment) -> Result<Vec<(String, Expr)>> {
        bindings
            .iter()
            .map(|(name, init)| Ok(((*name).to_owned(), self.resolve(init, env)?)))
            .collect()
    }
}

fn shape_error(form: &str, expected: &str, got: usize) -> Error {
    Error::syntax(format!("{form}: expected {expected}, got {got}"))
}

fn symbol_name<'s>(syntax: &'s Syntax, what: &str) -> Result<&'s str> {
    syntax
        .as_symbol()
        .ok_or_else(|| Error::syntax(format!("{what} must be a symbol, got {syntax}")))
}

fn symbol_list<'s>(syntax: &'s Syntax, what: &str) -> Result<Vec<&'s str>> {
    let Syntax::List(items) = syntax else {
        return Err(Error::syntax(format!("{what} list expected, got {syntax}")));
    };
    items.iter().map(|item| symbol_name(item, what)).collect()
}

fn check_unique(names: &[&str], context: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(*name) {
            return Err(Error::syntax(format!("{context}: duplicate name '{name}'")));
        }
    }
    Ok(())
}

/// Split `((name init) ...) body...` of `let`/`letrec`
fn binding_form<'s>(form: &str, operands: &'s [Syntax]) -> Result<(Vec<(&'s str, &'s Syntax)>, &'s [Syntax])> {
    let Some((Syntax::List(bindings), body)) = operands.split_first() else {
        return Err(Error::syntax(format!("{form}: expected a binding list and a body")));
    };
    let bindings = bindings
        .iter()
        .map(|binding| match binding {
            Syntax::List(pair) => match pair.as_slice() {
                [name, init] => Ok((symbol_name(name, &format!("{form} binding name"))?, init)),
                _ => Err(Error::syntax(format!("{form}: binding must be (name value), got {binding}"))),
            },
            other => Err(Error::syntax(format!("{form}: binding must be a list, got {other}"))),
        })
        .collect::<Result<Vec<_>>>()?;
    let names: Vec<&str> = bindings.iter().map(|(name, _)| *name).collect();
    check_unique(&names, form)?;
    Ok((bindings, body))
}

fn extend_all(env: &Environment, bindings: &[(&str, &Syntax)]) -> Environment {
    bindings
        .iter()
        .fold(env.clone(), |scope, (name, _)| scope.extend_placeholder(*name))
}
