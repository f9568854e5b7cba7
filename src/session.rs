//! Top-level driver.
//!
//! A [`Session`] owns the builtin table and the global environment and feeds
//! top-level forms through resolution and evaluation. Consecutive top-level
//! `define`s are held back and bound as one group right before the next
//! non-define form (or at end of input), so top-level procedures can refer to
//! each other the same way internal defines in a body can:
//!
//! ```scheme
//! (define (even? n) (if (= n 0) #t (odd? (- n 1))))
//! (define (odd? n) (if (= n 0) #f (even? (- n 1))))
//! (even? 10)   ; #t
//! ```

use std::fmt;
use std::io::Write;

use log::debug;

use crate::ast::{Syntax, Value};
use crate::builtinops::Builtins;
use crate::environment::Environment;
use crate::evaluator::{EvalContext, define_group, eval};
use crate::expr::Expr;
use crate::resolver::resolve;
use crate::scheme::parse_program_with_config;
use crate::{Error, InterpreterConfig, Result};

/// What happened to one top-level form
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A `define`, held until the group is flushed
    Deferred,
    /// A value the driver should print
    Print(Value),
    /// Evaluated for effect only
    Quiet,
    /// `(exit)` was evaluated; the session accepts no more input
    Exit,
}

pub struct Session {
    builtins: Builtins,
    env: Environment,
    config: InterpreterConfig,
    pending: Vec<(String, Expr)>,
    terminated: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Session {
            builtins: Builtins::new(),
            env: Environment::empty(),
            config,
            pending: Vec::new(),
            terminated: false,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Names of top-level defines not bound yet
    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one top-level form. An error discards any pending define group.
    pub fn feed(&mut self, syntax: &Syntax, out: &mut dyn Write) -> Result<Outcome> {
        if self.terminated {
            return Ok(Outcome::Exit);
        }
        let result = self.feed_form(syntax, out);
        if result.is_err() && !self.pending.is_empty() {
            debug!("discarding {} pending define(s) after error", self.pending.len());
            self.pending.clear();
        }
        result
    }

    fn feed_form(&mut self, syntax: &Syntax, out: &mut dyn Write) -> Result<Outcome> {
        let expr = resolve(syntax, &self.env, &self.builtins)?;
        if let Expr::Define(name, init) = expr {
            debug!("deferring top-level define of {name}");
            self.pending.push((name, *init));
            return Ok(Outcome::Deferred);
        }

        self.flush(out)?;
        let mut ctx = EvalContext::new(&self.builtins, out).with_max_depth(self.config.max_eval_depth);
        let value = eval(&expr, &mut self.env, &mut ctx)?;
        Ok(match value {
            Value::Terminate => {
                debug!("session terminated by exit");
                self.terminated = true;
                Outcome::Exit
            }
            Value::Void if !expr.is_explicit_void() => Outcome::Quiet,
            value => Outcome::Print(value),
        })
    }

    /// Bind the pending define group: every name gets a placeholder first,
    /// then each initializer is evaluated and patched in order. The global
    /// environment only changes if the whole group succeeds.
    pub fn flush(&mut self, out: &mut dyn Write) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        debug!("binding {} top-level define(s) as one group", pending.len());

        let group: Vec<(&str, &Expr)> = pending
            .iter()
            .map(|(name, init)| (name.as_str(), init))
            .collect();
        let mut ctx = EvalContext::new(&self.builtins, out).with_max_depth(self.config.max_eval_depth);
        self.env = define_group(&group, &self.env, &mut ctx)?;
        Ok(())
    }

    /// Run a whole program, writing `display` output, results and error
    /// reports to `out`. Errors in one form are reported and the next form
    /// runs; only a read error stops the program before it starts.
    pub fn run_source(&mut self, source: &str, out: &mut dyn Write) -> Result<()> {
        let program = parse_program_with_config(source, &self.config.parse)?;
        for syntax in &program {
            match self.feed(syntax, out) {
                Ok(Outcome::Print(value)) => write_out(out, format_args!("{value}\n"))?,
                Ok(Outcome::Exit) => return Ok(()),
                Ok(Outcome::Deferred | Outcome::Quiet) => {}
                Err(e) => write_out(out, format_args!("Error: {e}\n"))?,
            }
        }
        if let Err(e) = self.flush(out) {
            write_out(out, format_args!("Error: {e}\n"))?;
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn write_out(out: &mut dyn Write, args: fmt::Arguments<'_>) -> Result<()> {
    out.write_fmt(args)
        .map_err(|e| Error::EvalError(format!("output failed: {e}")))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use crate::scheme::parse_scheme;

    fn run_program(source: &str) -> (Session, String) {
        let mut session = Session::new();
        let mut out = Vec::new();
        session.run_source(source, &mut out).unwrap();
        (session, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_mutual_recursion_at_top_level() {
        let (_, output) = run_program(
            "(define (even? n) (if (= n 0) #t (odd? (- n 1))))
             (define (odd? n) (if (= n 0) #f (even? (- n 1))))
             (even? 10)
             (odd? 7)",
        );
        assert_eq!(output, "#t\n#t\n");
    }

    #[test]
    fn test_group_is_split_by_non_define() {
        // `f` closes over the environment of its own group, which lacks `g`
        let (_, output) = run_program("(define (f) (g)) 1 (define (g) 2) (f)");
        assert_eq!(output, "1\nError: Unbound variable: g\n");
    }

    #[test]
    fn test_error_discards_pending_group() {
        let (session, output) = run_program("(define a 1) (define b (car 5)) a a");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{output}");
        assert!(lines[0].starts_with("Error: Type error"), "{output}");
        assert_eq!(lines[1], "Error: Unbound variable: a");
        assert!(session.env().get("a").is_none());
    }

    #[test]
    fn test_resolve_error_discards_pending_group() {
        let mut session = Session::new();
        let mut out = Vec::new();
        let define = parse_scheme("(define x 1)").unwrap();
        assert_eq!(session.feed(&define, &mut out).unwrap(), Outcome::Deferred);
        assert_eq!(session.pending_names().collect::<Vec<_>>(), vec!["x"]);

        let bad = parse_scheme("(if 1)").unwrap();
        assert!(session.feed(&bad, &mut out).is_err());
        assert_eq!(session.pending_names().count(), 0);
        session.flush(&mut out).unwrap();
        assert!(session.env().get("x").is_none());
    }

    #[test]
    fn test_pending_defines_flushed_at_end_of_input() {
        let (session, output) = run_program("(define x 5) (define (f) x)");
        assert_eq!(output, "");
        assert_eq!(session.env().get("x"), Some(val(5)));
        assert!(session.env().get("f").is_some());
    }

    #[test]
    fn test_void_printing_rule() {
        let (_, output) = run_program(
            "(define x 1)
             (set! x 2)
             (display \"out\")
             (void)
             (if #t (void) 1)
             (begin 1 (void))
             (cond (#f 1))
             (cond (else (void)))
             x",
        );
        assert_eq!(output, "out#<void>\n#<void>\n#<void>\n#<void>\n2\n");
    }

    #[test]
    fn test_exit_stops_the_session() {
        let (session, output) = run_program("1 (exit) 2");
        assert_eq!(output, "1\n");
        assert!(session.is_terminated());

        let mut session = session;
        let mut out = Vec::new();
        let form = parse_scheme("3").unwrap();
        assert_eq!(session.feed(&form, &mut out).unwrap(), Outcome::Exit);
    }

    #[test]
    fn test_errors_do_not_stop_the_program() {
        let (_, output) = run_program("(car '()) (+ 1 2) (expt 2 31) '(1 . 2)");
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("Error: Type error"), "{output}");
        assert_eq!(lines[1], "3");
        assert_eq!(lines[2], "Error: Integer overflow in expt");
        assert_eq!(lines[3], "(1 . 2)");
    }

    #[test]
    fn test_read_error_runs_nothing() {
        let mut session = Session::new();
        let mut out = Vec::new();
        assert!(matches!(
            session.run_source("(display 1) (", &mut out),
            Err(Error::ParseError(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_configured_depth_limit() {
        let config = InterpreterConfig {
            max_eval_depth: 40,
            ..InterpreterConfig::default()
        };
        let mut session = Session::with_config(config);
        let mut out = Vec::new();
        session
            .run_source(
                "(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1))))) (count 3) (count 500)",
                &mut out,
            )
            .unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.starts_with("3\nError: EvaluationError: Evaluation depth limit exceeded"), "{output}");
    }

    #[test]
    fn test_redefinition_across_groups() {
        let (session, output) = run_program("(define x 1) x (define x 2) x (define car 3)");
        assert_eq!(output, "1\n2\nError: SyntaxError: cannot redefine builtin 'car'\n");
        assert_eq!(session.env().get("x"), Some(val(2)));
    }
}
