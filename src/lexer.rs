//! PDF lexer (tokenizer).
//!
//! Recognizes the token types needed to read indirect objects, trailers and
//! object streams: numbers, literal and hex strings, names, keywords and
//! delimiters. Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL)
//! are skipped before every token.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw literal string bytes, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Raw hex string digits, whitespace preserved
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` in `10 0 R`
    R,
}

pub(crate) fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub(crate) fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let trimmed = remaining
            .iter()
            .position(|&c| !is_whitespace(c))
            .map_or(&remaining[remaining.len()..], |p| &remaining[p..]);
        match comment(trimmed) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return trimmed,
        }
    }
}

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse an integer or real number: `42`, `-123`, `+17`, `3.14`, `.5`, `5.`.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom_error(start, nom::error::ErrorKind::Digit));
    }

    let digits = |bytes: &[u8]| std::str::from_utf8(bytes).unwrap_or("0").to_string();
    let negative = sign == Some('-');

    match frac_part {
        Some(frac) => {
            let text = format!(
                "{}{}.{}",
                if negative { "-" } else { "" },
                int_part.map(digits).unwrap_or_else(|| "0".to_string()),
                frac.map(digits).unwrap_or_else(|| "0".to_string())
            );
            let num: f64 = text
                .parse()
                .map_err(|_| nom_error(start, nom::error::ErrorKind::Float))?;
            Ok((input, Token::Real(num)))
        },
        None => {
            let text = int_part.map(digits).unwrap_or_default();
            let num: i64 = text
                .parse()
                .map_err(|_| nom_error(start, nom::error::ErrorKind::Digit))?;
            Ok((input, Token::Integer(if negative { -num } else { num })))
        },
    }
}

/// Parse a literal string `( ... )` with balanced parentheses and escapes.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return Err(nom_error(input, nom::error::ErrorKind::Tag));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string `<48656C6C6F>`.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom_error(input, nom::error::ErrorKind::Tag));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in PDF names (`/A#20B` is "A B").
///
/// Invalid sequences are preserved literally.
pub fn decode_name_escapes(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes: &[u8]| Token::Name(decode_name_escapes(&String::from_utf8_lossy(bytes))),
        ),
    )(input)
}

/// Keywords must not run into a following regular character (`nullx` is not `null`).
fn keyword<'a>(word: &'static [u8], tok: Token<'static>) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input: &'a [u8]| {
        let (rest, _) = tag(word)(input)?;
        match rest.first() {
            Some(&c) if !is_whitespace(c) && !is_delimiter(c) => {
                Err(nom_error(input, nom::error::ErrorKind::Tag))
            },
            _ => Ok((rest, tok.clone())),
        }
    }
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        keyword(b"false", Token::False),
        keyword(b"true", Token::True),
        keyword(b"null", Token::Null),
        keyword(b"obj", Token::ObjStart),
        keyword(b"endobj", Token::ObjEnd),
        keyword(b"endstream", Token::StreamEnd),
        keyword(b"stream", Token::StreamStart),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        keyword(b"R", Token::R),
    ))(input)
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}
