// Property tests for the reader.
//
// Printing a syntax tree and reading it back gives the same tree, and the
// reader returns an error rather than panicking on arbitrary text.

use crate::strategies::arb_syntax;
use proptest::prelude::*;
use schemecore::scheme::{parse_program, parse_scheme};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn printed_syntax_reads_back(syntax in arb_syntax()) {
        let printed = syntax.to_string();
        let read = parse_scheme(&printed);
        prop_assert_eq!(read, Ok(syntax), "failed to read back {}", printed);
    }

    #[test]
    fn reader_never_panics(input in "\\PC{0,64}") {
        let _ = parse_program(&input);
    }

    #[test]
    fn reader_never_panics_on_scheme_like_text(input in "[()'\" a-z0-9#;./\\\\-]{0,64}") {
        let _ = parse_program(&input);
    }

    #[test]
    fn quote_shorthand_matches_long_form(syntax in arb_syntax()) {
        let short = parse_scheme(&format!("'{syntax}"));
        let long = parse_scheme(&format!("(quote {syntax})"));
        prop_assert_eq!(short, long);
    }
}
