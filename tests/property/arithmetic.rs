// Property tests for the exact numeric tower.
//
// Checks i32 results against i64 reference arithmetic: overflow must be an
// error, division must produce a rational with a positive denominator, and
// rational comparison must agree with cross-multiplication.

use crate::eval_str;
use proptest::prelude::*;
use schemecore::numeric::Rational;
use schemecore::{Error, Value};

fn expect_rational(value: Value) -> Rational {
    match value {
        Value::Rational(r) => r,
        other => panic!("expected a rational, got {other}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn division_gives_positive_denominator(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(b != 0);
        // sign normalization would need to negate i32::MIN
        prop_assume!(b > 0 || (a != i32::MIN && b != i32::MIN));
        let r = expect_rational(eval_str(&format!("(/ {a} {b})")).unwrap());
        prop_assert!(r.den() > 0, "denominator of {} is not positive", r);
        prop_assert_eq!(
            i64::from(r.num()) * i64::from(b),
            i64::from(a) * i64::from(r.den()),
            "{} is not {}/{}", r, a, b
        );
    }

    #[test]
    fn addition_is_checked(a in any::<i32>(), b in any::<i32>()) {
        let result = eval_str(&format!("(+ {a} {b})"));
        match a.checked_add(b) {
            Some(sum) => prop_assert_eq!(result, Ok(Value::Integer(sum))),
            None => prop_assert!(matches!(result, Err(Error::Overflow(_)))),
        }
    }

    #[test]
    fn multiplication_is_checked(a in any::<i32>(), b in any::<i32>()) {
        let result = eval_str(&format!("(* {a} {b})"));
        match a.checked_mul(b) {
            Some(product) => prop_assert_eq!(result, Ok(Value::Integer(product))),
            None => prop_assert!(matches!(result, Err(Error::Overflow(_)))),
        }
    }

    #[test]
    fn add_commutative(a in -10000i32..10000, b in -10000i32..10000) {
        let r1 = eval_str(&format!("(+ {a} {b})")).unwrap();
        let r2 = eval_str(&format!("(+ {b} {a})")).unwrap();
        prop_assert_eq!(r1, r2);
    }

    #[test]
    fn sub_inverse_of_add(a in -10000i32..10000, b in -10000i32..10000) {
        let r = eval_str(&format!("(- (+ {a} {b}) {b})")).unwrap();
        prop_assert_eq!(r, Value::Integer(a));
    }

    #[test]
    fn rational_sum_is_exact(
        n1 in -1000i32..1000, d1 in 1i32..1000,
        n2 in -1000i32..1000, d2 in 1i32..1000,
    ) {
        let r = expect_rational(eval_str(&format!("(+ {n1}/{d1} {n2}/{d2})")).unwrap());
        let expected = Rational::try_new(n1 * d2 + n2 * d1, d1 * d2).unwrap();
        prop_assert!(r.value_eq(&expected), "{} != {}", r, expected);
    }

    #[test]
    fn comparison_agrees_with_cross_multiplication(
        n1 in any::<i32>(), d1 in 1..=i32::MAX,
        n2 in any::<i32>(), d2 in 1..=i32::MAX,
    ) {
        let lhs = i64::from(n1) * i64::from(d2);
        let rhs = i64::from(n2) * i64::from(d1);
        let less = eval_str(&format!("(< {n1}/{d1} {n2}/{d2})")).unwrap();
        let equal = eval_str(&format!("(= {n1}/{d1} {n2}/{d2})")).unwrap();
        prop_assert_eq!(less, Value::Boolean(lhs < rhs));
        prop_assert_eq!(equal, Value::Boolean(lhs == rhs));
    }

    #[test]
    fn modulo_takes_sign_of_dividend(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(b != 0);
        prop_assume!(!(a == i32::MIN && b == -1));
        let r = eval_str(&format!("(modulo {a} {b})")).unwrap();
        prop_assert_eq!(r, Value::Integer(a % b));
    }
}
