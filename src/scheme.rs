//! Reader: source text to [`Syntax`] trees, built from nom combinators.
//!
//! Supported datums: integers, rationals written `n/d`, strings with the usual
//! escapes, `#t`/`#f`, symbols (the lone `.` included), parenthesized lists and
//! the `'x` shorthand for `(quote x)`. When [`ParseConfig::handle_comments`] is
//! set, `;` starts a comment running to the end of the line.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded},
};

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{NumberType, Syntax};

/// Characters allowed in a symbol besides alphanumerics
const SYMBOL_SPECIAL_CHARS: &str = "!$%&*/:<=>?^_~+-.@";

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Treat `;` as a line comment
    pub handle_comments: bool,
    /// Maximum list/quote nesting depth
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

fn failure(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, kind))
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_message(
    input: &str,
    error: nom::Err<nom::error::Error<&str>>,
    config: &ParseConfig,
) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::Char => format!("Expected character at position {position}"),
                ErrorKind::TooLarge => format!(
                    "Expression too deeply nested (max depth: {})",
                    config.max_depth
                ),
                ErrorKind::Digit => format!("Number out of range at position {position}"),
                ErrorKind::Verify => format!("Zero denominator at position {position}"),
                ErrorKind::Escaped => format!("Bad string escape at position {position}"),
                _ => {
                    if position < input.len() {
                        let remaining_chars: String =
                            input.chars().skip(position).take(10).collect();
                        format!("Invalid syntax near '{remaining_chars}'")
                    } else {
                        "Unexpected end of input".into()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "Incomplete input".into(),
    }
}

/// Skip whitespace, and comments when enabled
fn skip_space<'a>(input: &'a str, config: &ParseConfig) -> IResult<&'a str, ()> {
    if config.handle_comments {
        let comment = recognize(pair(char(';'), take_while(|c: char| c != '\n')));
        value((), many0(alt((multispace1, comment)))).parse(input)
    } else {
        value((), multispace0).parse(input)
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Interpret a whole token as `[-]digits` or `[-]digits/digits`
fn number_literal(token: &str) -> IResult<&str, (&str, Option<&str>)> {
    all_consuming(pair(
        recognize(pair(opt(char('-')), digit1)),
        opt(preceded(char('/'), digit1)),
    ))
    .parse(token)
}

/// Parse a number or a symbol. Both are runs of symbol characters; a token
/// matching the number grammar is a number, anything else is a symbol.
fn parse_atom(input: &str) -> IResult<&str, Syntax> {
    let (remaining, token) = take_while1(is_symbol_char).parse(input)?;

    let Ok((_, (numerator, denominator))) = number_literal(token) else {
        return Ok((remaining, Syntax::Symbol(token.to_owned())));
    };
    let num = numerator
        .parse::<NumberType>()
        .map_err(|_| failure(input, ErrorKind::Digit))?;
    match denominator {
        None => Ok((remaining, Syntax::Integer(num))),
        Some(digits) => {
            let den = digits
                .parse::<NumberType>()
                .map_err(|_| failure(input, ErrorKind::Digit))?;
            if den == 0 {
                return Err(failure(input, ErrorKind::Verify));
            }
            Ok((remaining, Syntax::Rational(num, den)))
        }
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Syntax> {
    alt((
        value(Syntax::Bool(true), tag("#t")),
        value(Syntax::Bool(false), tag("#f")),
    ))
    .parse(input)
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Syntax> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), Syntax::String(text))),
            Some('\\') => {
                match chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    _ => return Err(failure(remaining, ErrorKind::Escaped)),
                }
                remaining = chars.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = chars.as_str();
            }
            None => return Err(failure(remaining, ErrorKind::Char)),
        }
    }
}

/// Parse a parenthesized list
fn parse_list<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Syntax> {
    let (input, _) = char('(').parse(input)?;
    let (input, elements) = many0(preceded(
        |i| skip_space(i, config),
        |i| parse_sexpr(i, config, depth + 1),
    ))
    .parse(input)?;
    let (input, _) = skip_space(input, config)?;
    let (input, _) = char(')').parse(input)?;
    Ok((input, Syntax::List(elements)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Syntax> {
    let (input, _) = char('\'').parse(input)?;
    let (input, _) = skip_space(input, config)?;
    let (input, datum) = parse_sexpr(input, config, depth + 1)?;
    Ok((
        input,
        Syntax::List(vec![Syntax::Symbol("quote".into()), datum]),
    ))
}

/// Parse one datum with no leading whitespace
fn parse_sexpr<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Syntax> {
    if depth >= config.max_depth {
        return Err(failure(input, ErrorKind::TooLarge));
    }
    alt((
        |i| parse_quote(i, config, depth),
        |i| parse_list(i, config, depth),
        parse_bool,
        parse_string,
        parse_atom,
    ))
    .parse(input)
}

/// Parse exactly one datum, with default settings
pub fn parse_scheme(input: &str) -> Result<Syntax, Error> {
    parse_scheme_with_config(input, &ParseConfig::default())
}

/// Parse exactly one datum. Surrounding whitespace is allowed, trailing input is not.
pub fn parse_scheme_with_config(input: &str, config: &ParseConfig) -> Result<Syntax, Error> {
    let mut datums = parse_program_with_config(input, config)?;
    match datums.len() {
        1 => Ok(datums.remove(0)),
        0 => Err(Error::ParseError("Unexpected end of input".into())),
        _ => Err(Error::ParseError(format!(
            "Unexpected remaining input after '{}'",
            datums[0]
        ))),
    }
}

/// Parse a sequence of datums, with default settings
pub fn parse_program(input: &str) -> Result<Vec<Syntax>, Error> {
    parse_program_with_config(input, &ParseConfig::default())
}

/// Parse every datum in `input`, in order
pub fn parse_program_with_config(input: &str, config: &ParseConfig) -> Result<Vec<Syntax>, Error> {
    let result = (
        many0(preceded(
            |i| skip_space(i, config),
            |i| parse_sexpr(i, config, 0),
        )),
        |i| skip_space(i, config),
    )
        .parse(input);
    match result {
        Ok(("", (datums, ()))) => Ok(datums),
        Ok((remaining, _)) => Err(Error::ParseError(parse_error_to_message(
            input,
            nom::Err::Error(nom::error::Error::new(remaining, ErrorKind::Tag)),
            config,
        ))),
        Err(e) => Err(Error::ParseError(parse_error_to_message(input, e, config))),
    }
}
