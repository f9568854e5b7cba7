//! Exact numeric tower: 32-bit integers and unreduced rationals.
//!
//! Every operator handles the four operand combinations. Mixed
//! integer/rational cases lift the integer to `n/1` and use the fraction
//! formulas, so `1 + 1/2` is `(1*2 + 1*1)/(1*2)` = `3/2`.
//!
//! Two rules shape every result:
//! - the denominator is kept strictly positive, sign lives in the numerator;
//! - fractions are **not** reduced. `(+ 1/2 1/2)` is `4/4`. Compare rationals
//!   by value with [`Rational::value_eq`] rather than structurally.
//!
//! All integer steps are checked. Overflow raises [`Error::Overflow`] rather
//! than wrapping.

use std::cmp::Ordering;
use std::fmt;

use crate::Error;
use crate::ast::{NumberType, Value};

/// An exact fraction with a strictly positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: NumberType,
    den: NumberType,
}

impl Rational {
    #[cfg(test)]
    #[expect(clippy::unwrap_used)] // test code OK
    pub(crate) fn new(num: NumberType, den: NumberType) -> Self {
        Self::try_new(num, den).unwrap()
    }

    /// Build a rational, moving a negative sign into the numerator. Zero
    /// denominators and unrepresentable sign normalization are errors.
    pub fn try_new(num: NumberType, den: NumberType) -> Result<Self, Error> {
        if den == 0 {
            return Err(Error::DivisionByZero("division"));
        }
        if den < 0 {
            let num = num.checked_neg().ok_or(Error::Overflow("sign normalization"))?;
            let den = den.checked_neg().ok_or(Error::Overflow("sign normalization"))?;
            return Ok(Rational { num, den });
        }
        Ok(Rational { num, den })
    }

    pub fn num(&self) -> NumberType {
        self.num
    }

    pub fn den(&self) -> NumberType {
        self.den
    }

    /// Value equality by cross-multiplication (`1/2` equals `2/4`)
    pub fn value_eq(&self, other: &Rational) -> bool {
        i64::from(self.num) * i64::from(other.den) == i64::from(other.num) * i64::from(self.den)
    }

    fn from_integer(n: NumberType) -> Self {
        Rational { num: n, den: 1 }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// The numeric view of a value
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(NumberType),
    Rat(Rational),
}

impl Number {
    fn from_value(value: &Value, op: &str) -> Result<Number, Error> {
        match value {
            Value::Integer(n) => Ok(Number::Int(*n)),
            Value::Rational(r) => Ok(Number::Rat(*r)),
            other => Err(Error::type_error(format!(
                "{op} expects numbers, got {} {other}",
                other.type_name()
            ))),
        }
    }

    fn as_rational(self) -> Rational {
        match self {
            Number::Int(n) => Rational::from_integer(n),
            Number::Rat(r) => r,
        }
    }
}

/// Checked i32 arithmetic, reporting the operation name on overflow
fn checked(result: Option<NumberType>, op: &'static str) -> Result<NumberType, Error> {
    result.ok_or(Error::Overflow(op))
}

fn rational_value(num: NumberType, den: NumberType, op: &'static str) -> Result<Value, Error> {
    if den < 0 {
        let num = checked(num.checked_neg(), op)?;
        let den = checked(den.checked_neg(), op)?;
        return Ok(Value::Rational(Rational { num, den }));
    }
    Ok(Value::Rational(Rational { num, den }))
}

pub fn add(a: &Value, b: &Value) -> Result<Value, Error> {
    const OP: &str = "addition";
    match (Number::from_value(a, "+")?, Number::from_value(b, "+")?) {
        (Number::Int(x), Number::Int(y)) => Ok(Value::Integer(checked(x.checked_add(y), OP)?)),
        (x, y) => {
            let (x, y) = (x.as_rational(), y.as_rational());
            let left = checked(x.num.checked_mul(y.den), OP)?;
            let right = checked(y.num.checked_mul(x.den), OP)?;
            let num = checked(left.checked_add(right), OP)?;
            let den = checked(x.den.checked_mul(y.den), OP)?;
            rational_value(num, den, OP)
        }
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, Error> {
    const OP: &str = "subtraction";
    match (Number::from_value(a, "-")?, Number::from_value(b, "-")?) {
        (Number::Int(x), Number::Int(y)) => Ok(Value::Integer(checked(x.checked_sub(y), OP)?)),
        (x, y) => {
            let (x, y) = (x.as_rational(), y.as_rational());
            let left = checked(x.num.checked_mul(y.den), OP)?;
            let right = checked(y.num.checked_mul(x.den), OP)?;
            let num = checked(left.checked_sub(right), OP)?;
            let den = checked(x.den.checked_mul(y.den), OP)?;
            rational_value(num, den, OP)
        }
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, Error> {
    const OP: &str = "multiplication";
    match (Number::from_value(a, "*")?, Number::from_value(b, "*")?) {
        (Number::Int(x), Number::Int(y)) => Ok(Value::Integer(checked(x.checked_mul(y), OP)?)),
        (x, y) => {
            let (x, y) = (x.as_rational(), y.as_rational());
            let num = checked(x.num.checked_mul(y.num), OP)?;
            let den = checked(x.den.checked_mul(y.den), OP)?;
            rational_value(num, den, OP)
        }
    }
}

/// Division always yields a rational, even for two integers.
pub fn div(a: &Value, b: &Value) -> Result<Value, Error> {
    const OP: &str = "division";
    let x = Number::from_value(a, "/")?.as_rational();
    let y = Number::from_value(b, "/")?.as_rational();
    if y.num == 0 {
        return Err(Error::DivisionByZero("/"));
    }
    let num = checked(x.num.checked_mul(y.den), OP)?;
    let den = checked(x.den.checked_mul(y.num), OP)?;
    rational_value(num, den, OP)
}

pub fn negate(a: &Value) -> Result<Value, Error> {
    sub(&Value::Integer(0), a)
}

pub fn reciprocal(a: &Value) -> Result<Value, Error> {
    div(&Value::Integer(1), a)
}

/// Integer remainder; the result takes the sign of the dividend.
pub fn modulo(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Integer(_), Value::Integer(0)) => Err(Error::DivisionByZero("modulo")),
        (Value::Integer(x), Value::Integer(y)) => {
            Ok(Value::Integer(checked(x.checked_rem(*y), "modulo")?))
        }
        _ => Err(Error::type_error(format!(
            "modulo is only defined for integers, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Integer power by binary exponentiation, range-checked at every multiply.
pub fn expt(base: &Value, exponent: &Value) -> Result<Value, Error> {
    const OP: &str = "expt";
    let (Value::Integer(base), Value::Integer(exponent)) = (base, exponent) else {
        return Err(Error::type_error(format!(
            "expt is only defined for integers, got {} and {}",
            base.type_name(),
            exponent.type_name()
        )));
    };
    if *exponent < 0 {
        return Err(Error::DomainError(format!(
            "negative exponent {exponent} is not supported for integers"
        )));
    }
    if *base == 0 && *exponent == 0 {
        return Err(Error::DomainError("0^0 is undefined".to_owned()));
    }

    let mut result: NumberType = 1;
    let mut square = *base;
    let mut remaining = *exponent;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = checked(result.checked_mul(square), OP)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            square = checked(square.checked_mul(square), OP)?;
        }
    }
    Ok(Value::Integer(result))
}

/// Three-way numeric comparison. Cross-multiplication is done in i64 so it is
/// always exact for 32-bit operands.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, Error> {
    match (
        Number::from_value(a, "comparison")?,
        Number::from_value(b, "comparison")?,
    ) {
        (Number::Int(x), Number::Int(y)) => Ok(x.cmp(&y)),
        (x, y) => {
            let (x, y) = (x.as_rational(), y.as_rational());
            let left = i64::from(x.num) * i64::from(y.den);
            let right = i64::from(y.num) * i64::from(x.den);
            Ok(left.cmp(&right))
        }
    }
}

/// The five numeric comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Comparison {
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ge => ordering != Ordering::Less,
            Comparison::Gt => ordering == Ordering::Greater,
        }
    }

    pub fn apply(self, a: &Value, b: &Value) -> Result<bool, Error> {
        Ok(self.holds(compare(a, b)?))
    }

    /// Chained comparison over adjacent pairs, stopping at the first pair that
    /// fails.
    pub fn apply_chain(self, args: &[Value]) -> Result<bool, Error> {
        for window in args.windows(2) {
            if !self.apply(&window[0], &window[1])? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub fn add_all(args: &[Value]) -> Result<Value, Error> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Value::Integer(0));
    };
    Number::from_value(first, "+")?;
    rest.iter().try_fold(first.clone(), |acc, x| add(&acc, x))
}

pub fn mul_all(args: &[Value]) -> Result<Value, Error> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Value::Integer(1));
    };
    Number::from_value(first, "*")?;
    rest.iter().try_fold(first.clone(), |acc, x| mul(&acc, x))
}

/// `(- x)` negates, `(- x y z)` subtracts left to right
pub fn sub_all(args: &[Value]) -> Result<Value, Error> {
    match args {
        [] => Err(Error::arity_error("-", "at least 1", 0)),
        [only] => negate(only),
        [first, rest @ ..] => rest.iter().try_fold(first.clone(), |acc, x| sub(&acc, x)),
    }
}

/// `(/ x)` is the reciprocal, `(/ x y z)` divides left to right
pub fn div_all(args: &[Value]) -> Result<Value, Error> {
    match args {
        [] => Err(Error::arity_error("/", "at least 1", 0)),
        [only] => reciprocal(only),
        [first, rest @ ..] => rest.iter().try_fold(first.clone(), |acc, x| div(&acc, x)),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;

    fn rat(num: NumberType, den: NumberType) -> Value {
        Value::Rational(Rational::new(num, den))
    }

    /// Assert a rational result equals `num/den` by value, and that its
    /// denominator is positive
    fn assert_rational_value(actual: &Value, num: NumberType, den: NumberType) {
        match actual {
            Value::Rational(r) => {
                assert!(r.den() > 0, "denominator must be positive: {r}");
                assert!(
                    r.value_eq(&Rational::new(num, den)),
                    "expected value {num}/{den}, got {r}"
                );
            }
            other => panic!("expected rational, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(add(&val(2), &val(3)).unwrap(), val(5));
        assert_eq!(sub(&val(2), &val(3)).unwrap(), val(-1));
        assert_eq!(mul(&val(-4), &val(3)).unwrap(), val(-12));
        assert_eq!(add_all(&[]).unwrap(), val(0));
        assert_eq!(mul_all(&[]).unwrap(), val(1));
        assert_eq!(add_all(&[val(1), val(2), val(3)]).unwrap(), val(6));
        assert_eq!(sub_all(&[val(10), val(3), val(2)]).unwrap(), val(5));
        assert_eq!(sub_all(&[val(7)]).unwrap(), val(-7));
        assert_eq!(mul_all(&[val(2), val(3), val(4)]).unwrap(), val(24));
    }

    #[test]
    fn test_rational_arithmetic_is_unreduced() {
        // cross-multiplied, no gcd step
        let sum = add(&rat(1, 2), &rat(1, 3)).unwrap();
        assert_eq!(sum, rat(5, 6));
        let sum = add(&rat(1, 2), &rat(1, 2)).unwrap();
        assert_eq!(sum, rat(4, 4));
        assert_rational_value(&sum, 1, 1);

        assert_eq!(add(&val(1), &rat(1, 2)).unwrap(), rat(3, 2));
        assert_eq!(add(&rat(1, 2), &val(1)).unwrap(), rat(3, 2));
        assert_eq!(sub(&val(1), &rat(1, 3)).unwrap(), rat(2, 3));
        assert_eq!(sub(&rat(1, 3), &val(1)).unwrap(), rat(-2, 3));
        assert_eq!(mul(&rat(2, 3), &rat(3, 4)).unwrap(), rat(6, 12));
        assert_eq!(mul(&val(2), &rat(1, 4)).unwrap(), rat(2, 4));
    }

    #[test]
    fn test_division() {
        assert_eq!(div(&val(6), &val(3)).unwrap(), rat(6, 3));
        assert_eq!(div(&val(1), &val(-2)).unwrap(), rat(-1, 2));
        assert_eq!(div(&val(-1), &val(-2)).unwrap(), rat(1, 2));
        assert_eq!(div(&rat(1, 2), &rat(-1, 3)).unwrap(), rat(-3, 2));
        assert_eq!(div(&val(2), &rat(1, 3)).unwrap(), rat(6, 1));
        assert_eq!(div(&rat(1, 2), &val(-4)).unwrap(), rat(-1, 8));
        assert_eq!(div_all(&[val(2)]).unwrap(), rat(1, 2));

        assert_eq!(div(&val(1), &val(0)), Err(Error::DivisionByZero("/")));
        assert_eq!(div(&rat(1, 2), &rat(0, 5)), Err(Error::DivisionByZero("/")));
        assert_eq!(div(&val(1), &rat(0, 1)), Err(Error::DivisionByZero("/")));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let max = val(NumberType::MAX);
        assert_eq!(add(&max, &val(1)), Err(Error::Overflow("addition")));
        assert_eq!(sub(&val(NumberType::MIN), &val(1)), Err(Error::Overflow("subtraction")));
        assert_eq!(mul(&max, &val(2)), Err(Error::Overflow("multiplication")));
        assert_eq!(negate(&val(NumberType::MIN)), Err(Error::Overflow("subtraction")));
        assert!(add(&rat(1, 65536), &rat(1, 65536)).is_err());
    }

    #[test]
    fn test_modulo() {
        assert_eq!(modulo(&val(7), &val(3)).unwrap(), val(1));
        assert_eq!(modulo(&val(-7), &val(3)).unwrap(), val(-1));
        assert_eq!(modulo(&val(5), &val(0)), Err(Error::DivisionByZero("modulo")));
        assert!(matches!(modulo(&rat(1, 2), &val(3)), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_expt() {
        assert_eq!(expt(&val(2), &val(10)).unwrap(), val(1024));
        assert_eq!(expt(&val(2), &val(30)).unwrap(), val(1 << 30));
        assert_eq!(expt(&val(-2), &val(31)).unwrap(), val(NumberType::MIN));
        assert_eq!(expt(&val(7), &val(0)).unwrap(), val(1));
        assert_eq!(expt(&val(0), &val(5)).unwrap(), val(0));
        assert_eq!(expt(&val(46341), &val(1)).unwrap(), val(46341));
        assert_eq!(expt(&val(2), &val(31)), Err(Error::Overflow("expt")));
        assert_eq!(expt(&val(46341), &val(2)), Err(Error::Overflow("expt")));
        assert!(matches!(expt(&val(0), &val(0)), Err(Error::DomainError(_))));
        assert!(matches!(expt(&val(2), &val(-1)), Err(Error::DomainError(_))));
        assert!(matches!(expt(&rat(1, 2), &val(2)), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(compare(&val(1), &val(2)).unwrap(), Ordering::Less);
        assert_eq!(compare(&rat(1, 2), &rat(2, 4)).unwrap(), Ordering::Equal);
        assert_eq!(compare(&rat(1, 2), &val(1)).unwrap(), Ordering::Less);
        assert_eq!(compare(&val(1), &rat(-1, 2)).unwrap(), Ordering::Greater);
        assert_eq!(compare(&rat(6, 3), &val(2)).unwrap(), Ordering::Equal);
        assert!(compare(&val(1), &val(true)).is_err());

        assert!(Comparison::Lt.apply_chain(&[val(1), val(2), val(3)]).unwrap());
        assert!(!Comparison::Lt.apply_chain(&[val(1), val(3), val(2)]).unwrap());
        assert!(Comparison::Le.apply_chain(&[val(1), val(1), val(2)]).unwrap());
        assert!(Comparison::Eq.apply_chain(&[rat(1, 2), rat(2, 4), rat(3, 6)]).unwrap());
        assert!(Comparison::Ge.apply_chain(&[val(3), val(3), val(1)]).unwrap());
        assert!(!Comparison::Gt.apply_chain(&[val(3), val(3), val(1)]).unwrap());
        // short-circuits before reaching the bad operand
        assert!(!Comparison::Lt.apply_chain(&[val(2), val(1), val("x")]).unwrap());
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(add(&val(1), &val("a")), Err(Error::TypeError(_))));
        assert!(matches!(add_all(&[val(true)]), Err(Error::TypeError(_))));
        assert!(matches!(mul_all(&[val("x")]), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_try_new_normalizes_sign() {
        let r = Rational::try_new(3, -4).unwrap();
        assert_eq!((r.num(), r.den()), (-3, 4));
        assert_eq!(Rational::try_new(1, 0), Err(Error::DivisionByZero("division")));
        assert!(Rational::try_new(NumberType::MIN, -1).is_err());
        assert!(Rational::try_new(1, NumberType::MIN).is_err());
    }
}
