//! Proptest strategies for generating reader input.

use proptest::prelude::*;
use schemecore::Syntax;

/// Symbols that can never be mistaken for numbers or the dot token
pub fn arb_symbol() -> impl Strategy<Value = String> {
    "[a-z!?*<>=][a-z0-9!?*<>=+-]{0,6}"
}

/// String contents, including the characters that need escaping
pub fn arb_string() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \"\\\\\n\t]{0,12}"
}

/// Atoms the reader produces: integers, rationals, strings, booleans, symbols
pub fn arb_atom() -> impl Strategy<Value = Syntax> {
    prop_oneof![
        4 => any::<i32>().prop_map(Syntax::Integer),
        2 => (any::<i32>(), 1..=i32::MAX).prop_map(|(n, d)| Syntax::Rational(n, d)),
        2 => arb_string().prop_map(Syntax::String),
        1 => any::<bool>().prop_map(Syntax::Bool),
        4 => arb_symbol().prop_map(Syntax::Symbol),
    ]
}

/// Nested syntax trees of bounded depth
pub fn arb_syntax() -> BoxedStrategy<Syntax> {
    arb_atom()
        .prop_recursive(4, 48, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(Syntax::List)
        })
        .boxed()
}
