// Property-based tests harness
mod arithmetic;
mod reader;
mod strategies;

use schemecore::builtinops::Builtins;
use schemecore::environment::Environment;
use schemecore::evaluator::{EvalContext, eval};
use schemecore::resolver::resolve;
use schemecore::scheme::parse_scheme;
use schemecore::{Error, Value};

/// Read, resolve and evaluate one datum in a fresh environment
pub fn eval_str(source: &str) -> Result<Value, Error> {
    let builtins = Builtins::new();
    let mut env = Environment::empty();
    let mut out = Vec::new();
    let syntax = parse_scheme(source)?;
    let expr = resolve(&syntax, &env, &builtins)?;
    let mut ctx = EvalContext::new(&builtins, &mut out);
    eval(&expr, &mut env, &mut ctx)
}
