//! Tokenizer for the ClickHouse SQL dialect, built on nom.
//!
//! Tokenizing stops after the first top-level `;` so that statements after
//! the first one are never looked at.

use super::parser::ParseError;
use crate::error::Span;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit1, multispace1, one_of},
    combinator::{map, opt, recognize, value},
    multi::{fold_many0, many0, many0_count},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// The lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// A keyword or bare identifier.
    Word,
    /// A backtick or double-quoted identifier; carries the quote character.
    QuotedIdent(char),
    /// A single-quoted string literal.
    String,
    /// A numeric literal.
    Number,
    /// An operator or punctuation.
    Symbol,
}

/// A token borrowed from the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    /// The token value; quotes are stripped from strings and quoted
    /// identifiers.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub offset: usize,
    /// Byte offset just past the last character.
    pub end: usize,
}

impl Token<'_> {
    /// Returns true if this is the keyword `keyword` (case-insensitive).
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Returns true if this is the symbol `symbol`.
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }
}

/// Converts a byte offset into a character offset.
pub(crate) fn char_offset(source: &str, byte: usize) -> usize {
    source.get(..byte).map_or(byte, |prefix| prefix.chars().count())
}

/// Splits `source` into tokens, up to and including the first `;`.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut input = source;

    loop {
        if let Ok((rest, ())) = trivia(input) {
            input = rest;
        }
        if input.is_empty() {
            break;
        }

        let offset = source.len() - input.len();
        match token(input) {
            Ok((rest, (kind, text))) => {
                let end = source.len() - rest.len();
                tokens.push(Token {
                    kind,
                    text,
                    offset,
                    end,
                });
                input = rest;
                if kind == TokenKind::Symbol && text == ";" {
                    break;
                }
            }
            Err(_) => {
                let found = input.chars().next().unwrap_or_default();
                let message = match found {
                    '\'' => "Unterminated string literal".to_string(),
                    '`' | '"' => "Unterminated quoted identifier".to_string(),
                    other => format!("Unexpected character '{other}'"),
                };
                let start = char_offset(source, offset);
                return Err(ParseError::SyntaxError {
                    message,
                    span: Span::new(start, start + 1),
                });
            }
        }
    }

    Ok(tokens)
}

/// Returns the leading word of `source`, skipping whitespace and comments.
pub(crate) fn leading_word(source: &str) -> Option<&str> {
    let input = trivia(source).map_or(source, |(rest, ())| rest);
    word(input).ok().map(|(_, w)| w)
}

// ============================================================================
// Whitespace and comments
// ============================================================================

fn trivia(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, line_comment, block_comment)))).parse(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("--"), take_while(|c: char| c != '\n'))).parse(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

// ============================================================================
// Tokens
// ============================================================================

fn token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((
        map(string_literal, |s: &str| (TokenKind::String, s)),
        map(quoted_identifier('`'), |s: &str| (TokenKind::QuotedIdent('`'), s)),
        map(quoted_identifier('"'), |s: &str| (TokenKind::QuotedIdent('"'), s)),
        map(number, |s: &str| (TokenKind::Number, s)),
        map(word, |s: &str| (TokenKind::Word, s)),
        map(symbol, |s: &str| (TokenKind::Symbol, s)),
    ))
    .parse(input)
}

/// A piece of string literal content.
#[derive(Clone)]
enum StringFragment<'a> {
    Literal(&'a str),
    Escaped(char),
}

fn string_fragment(input: &str) -> IResult<&str, StringFragment<'_>> {
    alt((
        map(is_not("\\'"), StringFragment::Literal),
        value(StringFragment::Escaped('\''), tag("''")),
        map(preceded(char('\\'), anychar), |c| {
            StringFragment::Escaped(escape_char(c))
        }),
    ))
    .parse(input)
}

fn escape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'b' => '\u{8}',
        'f' => '\u{c}',
        other => other,
    }
}

/// Matches a quoted string and returns its raw content, escapes included.
fn string_literal(input: &str) -> IResult<&str, &str> {
    delimited(
        char('\''),
        recognize(many0_count(string_fragment)),
        char('\''),
    )
    .parse(input)
}

/// Decodes the raw content of a string token: backslash escapes and the
/// doubled quote `''`.
pub(crate) fn unescape_string(raw: &str) -> String {
    let decoded: IResult<&str, String> = fold_many0(
        string_fragment,
        String::new,
        |mut out, fragment| {
            match fragment {
                StringFragment::Literal(text) => out.push_str(text),
                StringFragment::Escaped(c) => out.push(c),
            }
            out
        },
    )
    .parse(raw);
    match decoded {
        Ok((_, text)) => text,
        Err(_) => raw.to_string(),
    }
}

fn quoted_identifier<'a>(
    quote: char,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    delimited(char(quote), take_while(move |c: char| c != quote), char(quote))
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((
            recognize((tag_no_case("0x"), take_while1(|c: char| c.is_ascii_hexdigit()))),
            recognize((digit1, opt((char('.'), digit1)))),
            recognize((char('.'), digit1)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))
    .parse(input)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    alt((
        tag("->"),
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("=="),
        tag("||"),
        tag("::"),
        recognize(one_of("=<>+-*/%(),.;[]{}:?")),
    ))
    .parse(input)
}

// ============================================================================
// Tests
// ============================================================================
