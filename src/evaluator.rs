use std::io::Write;
use std::rc::Rc;

use log::trace;

use crate::ast::{Procedure, Syntax, Value};
use crate::builtinops::{self, Builtins, Primitive};
use crate::environment::Environment;
use crate::expr::{CondClause, Expr};
use crate::numeric::Rational;
use crate::{Error, MAX_EVAL_DEPTH, Result};

/// Per-run evaluation state: the builtin table, the sink `display` writes to
/// and the nesting depth guard.
pub struct EvalContext<'a> {
    builtins: &'a Builtins,
    out: &'a mut dyn Write,
    depth: usize,
    max_depth: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(builtins: &'a Builtins, out: &'a mut dyn Write) -> Self {
        EvalContext {
            builtins,
            out,
            depth: 0,
            max_depth: MAX_EVAL_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Evaluate a resolved expression.
///
/// `env` is the caller's handle: a `define` replaces it with an extended
/// environment, so later expressions evaluated through the same handle see
/// the new binding.
pub fn eval(expr: &Expr, env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    if ctx.depth >= ctx.max_depth {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {})",
            ctx.max_depth
        )));
    }
    ctx.depth += 1;
    let result = eval_expr(expr, env, ctx);
    ctx.depth -= 1;
    result
}

fn eval_expr(expr: &Expr, env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    match expr {
        Expr::Fixnum(n) => Ok(Value::Integer(*n)),
        Expr::RationalNum(r) => Ok(Value::Rational(*r)),
        // each evaluation yields a distinct string object
        Expr::StringLit(s) => Ok(Value::String(Rc::from(&**s))),
        Expr::Bool(b) => Ok(Value::Boolean(*b)),
        Expr::MakeVoid => Ok(Value::Void),
        Expr::Exit => Ok(Value::Terminate),
        Expr::Var(name) => lookup(name, env, ctx),

        Expr::Unary(prim, arg) => {
            let arg = eval(arg, env, ctx)?;
            builtinops::apply_unary(*prim, &arg, &mut *ctx.out)
        }
        Expr::Binary(prim, a, b) => {
            let a = eval(a, env, ctx)?;
            let b = eval(b, env, ctx)?;
            builtinops::apply_binary(*prim, &a, &b)
        }
        Expr::Variadic(prim, args) => {
            let args = eval_args(args, env, ctx)?;
            builtinops::apply_variadic(*prim, &args)
        }

        Expr::Quote(datum) => syntax_to_value(datum),

        Expr::If(test, conseq, alter) => {
            if eval(test, env, ctx)?.is_true() {
                eval(conseq, env, ctx)
            } else {
                eval(alter, env, ctx)
            }
        }
        Expr::Cond(clauses) => eval_cond(clauses, env, ctx),
        Expr::And(exprs) => {
            let mut last = Value::Boolean(true);
            for expr in exprs {
                last = eval(expr, env, ctx)?;
                if !last.is_true() {
                    break;
                }
            }
            Ok(last)
        }
        Expr::Or(exprs) => {
            for expr in exprs {
                let value = eval(expr, env, ctx)?;
                if value.is_true() {
                    return Ok(value);
                }
            }
            Ok(Value::Boolean(false))
        }

        Expr::Lambda(lambda) => Ok(Value::Procedure(Rc::new(Procedure {
            params: Rc::clone(&lambda.params),
            body: Rc::clone(&lambda.body),
            env: env.clone(),
        }))),
        Expr::Apply(rator, rands) => eval_apply(rator, rands, env, ctx),

        Expr::Define(name, init) => eval_define(name, init, env, ctx),
        Expr::Let(bindings, body) => eval_let(bindings, body, env, ctx),
        Expr::Letrec(bindings, body) => eval_letrec(bindings, body, env, ctx),
        Expr::Set(name, value) => {
            let value = eval(value, env, ctx)?;
            env.modify(name, value)?;
            Ok(Value::Void)
        }
        Expr::Begin(exprs) => eval_sequence(exprs, env, ctx),
    }
}

fn eval_let(bindings: &[(String, Expr)], body: &Expr, env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let values = bindings
        .iter()
        .map(|(_, init)| eval(init, env, ctx))
        .collect::<Result<Vec<_>>>()?;
    let mut body_env = bindings
        .iter()
        .zip(values)
        .fold(env.clone(), |scope, ((name, _), value)| scope.extend(name.as_str(), value));
    eval(body, &mut body_env, ctx)
}

/// Every initializer runs while all the cells are still placeholders; the
/// cells are patched only once all of them have produced a value.
fn eval_letrec(bindings: &[(String, Expr)], body: &Expr, env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let mut rec_env = bindings
        .iter()
        .fold(env.clone(), |scope, (name, _)| scope.extend_placeholder(name.as_str()));
    let values = bindings
        .iter()
        .map(|(_, init)| eval(init, &mut rec_env, ctx))
        .collect::<Result<Vec<_>>>()?;
    for ((name, _), value) in bindings.iter().zip(values) {
        rec_env.modify(name, value)?;
    }
    eval(body, &mut rec_env, ctx)
}

fn eval_args(args: &[Expr], env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Vec<Value>> {
    args.iter().map(|arg| eval(arg, env, ctx)).collect()
}

/// Evaluate in order, returning the last value (void when empty)
fn eval_body(exprs: &[Expr], env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let mut last = Value::Void;
    for expr in exprs {
        last = eval(expr, env, ctx)?;
    }
    Ok(last)
}

fn eval_cond(clauses: &[CondClause], env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    for clause in clauses {
        match clause {
            CondClause::Else(body) => return eval_body(body, env, ctx),
            CondClause::Test(test, body) => {
                let value = eval(test, env, ctx)?;
                if !value.is_true() {
                    continue;
                }
                if body.is_empty() {
                    return Ok(value);
                }
                return eval_body(body, env, ctx);
            }
        }
    }
    Ok(Value::Void)
}

/// `begin`: a leading run of defines is bound as one group, then the
/// remaining forms run in that scope.
fn eval_sequence(exprs: &[Expr], env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let split = exprs
        .iter()
        .position(|expr| !matches!(expr, Expr::Define(..)))
        .unwrap_or(exprs.len());
    if split == 0 {
        return eval_body(exprs, env, ctx);
    }

    let (defines, rest) = exprs.split_at(split);
    let group: Vec<(&str, &Expr)> = defines
        .iter()
        .filter_map(|expr| match expr {
            Expr::Define(name, init) => Some((name.as_str(), init.as_ref())),
            _ => None,
        })
        .collect();
    let mut scope = define_group(&group, env, ctx)?;
    eval_body(rest, &mut scope, ctx)
}

/// Bind every name of a define group to a placeholder in one extended
/// environment, then evaluate and patch each initializer in order.
pub(crate) fn define_group(
    group: &[(&str, &Expr)],
    env: &Environment,
    ctx: &mut EvalContext<'_>,
) -> Result<Environment> {
    let mut scope = env.clone();
    for (name, _) in group {
        check_definable(name, ctx)?;
        scope = scope.extend_placeholder(*name);
    }
    for (name, init) in group {
        let value = eval(init, &mut scope, ctx)?;
        scope.modify(name, value)?;
    }
    Ok(scope)
}

fn check_definable(name: &str, ctx: &EvalContext<'_>) -> Result<()> {
    if ctx.builtins.is_reserved(name) {
        return Err(Error::syntax(format!("cannot redefine builtin '{name}'")));
    }
    Ok(())
}

fn eval_define(name: &str, init: &Expr, env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    check_definable(name, ctx)?;
    let scope = env.extend_placeholder(name);
    *env = scope.clone();
    let value = eval(init, env, ctx)?;
    scope.modify(name, value)?;
    Ok(Value::Void)
}

fn eval_apply(rator: &Expr, rands: &[Expr], env: &mut Environment, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let procedure = match eval(rator, env, ctx)? {
        Value::Procedure(procedure) => procedure,
        other => {
            return Err(Error::type_error(format!(
                "attempt to apply non-procedure {} {other}",
                other.type_name()
            )));
        }
    };
    let args = eval_args(rands, env, ctx)?;
    if args.len() != procedure.params.len() {
        return Err(Error::arity_error("procedure", procedure.params.len(), args.len()));
    }
    trace!("apply procedure with {} argument(s)", args.len());

    let mut call_env = procedure
        .params
        .iter()
        .zip(args)
        .fold(procedure.env.clone(), |scope, (param, arg)| {
            scope.extend(param.as_str(), arg)
        });
    eval(&procedure.body, &mut call_env, ctx)
}

/// Reject identifiers that can never name a variable
fn check_variable_name(name: &str) -> Result<()> {
    let malformed = match name.chars().next() {
        None => true,
        Some(first) => {
            first.is_ascii_digit()
                || first == '.'
                || first == '@'
                || name.contains(['\'', '"', '`', '#'])
        }
    };
    if malformed {
        return Err(Error::syntax(format!("malformed variable name '{name}'")));
    }
    Ok(())
}

fn lookup(name: &str, env: &Environment, ctx: &EvalContext<'_>) -> Result<Value> {
    check_variable_name(name)?;
    match env.find(name) {
        Some(cell) => {
            let value = cell.borrow().clone();
            value.ok_or_else(|| {
                Error::EvalError(format!("variable '{name}' used before initialization"))
            })
        }
        None => reify_primitive(name, env, ctx),
    }
}

/// Turn a free primitive name into a closure over its primitive node.
/// Parameters are `parm` for one operand, `parm1`/`parm2` for two.
fn reify_primitive(name: &str, env: &Environment, ctx: &EvalContext<'_>) -> Result<Value> {
    let Some(prim) = ctx.builtins.primitive(name) else {
        return Err(Error::UnboundVariable(name.to_owned()));
    };
    let Some(arity) = prim.reified_arity() else {
        return Err(Error::EvalError(format!(
            "primitive '{name}' cannot be used as a value"
        )));
    };
    let var = |param: &str| Box::new(Expr::Var(param.to_owned()));
    let (params, body) = match arity {
        0 if prim == Primitive::Exit => (Vec::new(), Expr::Exit),
        0 => (Vec::new(), Expr::MakeVoid),
        1 => (vec!["parm"], Expr::Unary(prim, var("parm"))),
        _ => (vec!["parm1", "parm2"], Expr::Binary(prim, var("parm1"), var("parm2"))),
    };
    trace!("reified primitive {name} as a {arity}-parameter procedure");
    Ok(Value::Procedure(Rc::new(Procedure {
        params: params.into_iter().map(str::to_owned).collect(),
        body: Rc::new(body),
        env: env.clone(),
    })))
}

/// Convert quoted syntax into a fresh runtime value. Lists become proper
/// lists, or a dotted chain when they contain a well-placed dot token.
pub fn syntax_to_value(syntax: &Syntax) -> Result<Value> {
    match syntax {
        Syntax::Integer(n) => Ok(Value::Integer(*n)),
        Syntax::Rational(n, d) => Ok(Value::Rational(Rational::try_new(*n, *d)?)),
        Syntax::String(s) => Ok(Value::string(s)),
        Syntax::Bool(b) => Ok(Value::Boolean(*b)),
        Syntax::Symbol(s) => Ok(Value::symbol(s)),
        Syntax::List(items) => {
            let (proper, tail) = Syntax::split_dotted(items)?;
            let tail = match tail {
                Some(tail) => syntax_to_value(tail)?,
                None => Value::Null,
            };
            proper
                .iter()
                .rev()
                .try_fold(tail, |rest, item| Ok(Value::cons(syntax_to_value(item)?, rest)))
        }
    }
}
