//! PDF object parser.
//!
//! Recursive descent over lexer tokens: primitives, arrays, dictionaries,
//! streams and `N G R` references. `parse_indirect_object` additionally reads
//! the `N G obj ... endobj` wrapper.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Decode escape sequences in a literal string (`\n`, `\(`, `\ddd`, line continuation).
///
/// Unknown escapes keep the backslash.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }
        match raw[i + 1] {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            c @ (b'(' | b')' | b'\\') => result.push(c),
            b'\n' => {},
            b'\r' => {
                if raw.get(i + 2) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let digits = raw[i + 1..]
                    .iter()
                    .take(3)
                    .take_while(|d| (b'0'..=b'7').contains(*d))
                    .count();
                let value = raw[i + 1..i + 1 + digits]
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
                result.push((value & 0xFF) as u8);
                i += 1 + digits;
                continue;
            },
            _ => {
                result.push(b'\\');
                i += 1;
                continue;
            },
        }
        i += 2;
    }

    result
}

/// Decode a hex string body; whitespace is ignored and an odd final digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    let nibble = |c: u8| {
        (c as char).to_digit(16).map(|v| v as u8).ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("invalid hex digit '{}'", c as char),
        })
    };

    digits
        .chunks(2)
        .map(|pair| {
            let hi = nibble(pair[0])?;
            let lo = match pair.get(1) {
                Some(&c) => nibble(c)?,
                None => 0,
            };
            Ok(hi << 4 | lo)
        })
        .collect()
}

/// Parse a PDF object from input bytes.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Integer(i) => {
            // Could be the start of `id gen R`
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if (0..=u32::MAX as i64).contains(&i) && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },
        Token::Real(r) => Ok((input, Object::Real(r))),
        Token::LiteralString(bytes) => Ok((input, Object::String(decode_literal_string_escapes(bytes)))),
        Token::HexString(hex) => match decode_hex(hex) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::HexDigit))),
        },
        Token::Name(name) => Ok((input, Object::Name(name))),
        Token::ArrayStart => parse_array(input),
        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (rest, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    rest,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }
            Ok((remaining, Object::Dictionary(dict)))
        },
        _ => Err(nom_error(input, nom::error::ErrorKind::Tag)),
    }
}

/// Read stream bytes after the `stream` keyword.
///
/// A direct `/Length` is trusted when `endstream` follows it; otherwise the
/// data runs up to the next `endstream` keyword.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(|o| o.as_integer()) {
        let length = length.max(0) as usize;
        if length <= input.len() {
            let after = crate::lexer::skip_ws(&input[length..]);
            if after.starts_with(b"endstream") {
                return Ok((&after[b"endstream".len()..], input[..length].to_vec()));
            }
        }
        log::debug!("stream /Length {} does not reach endstream, scanning", length);
    }

    let pos = find_subslice(input, b"endstream").ok_or_else(|| nom_error(input, nom::error::ErrorKind::Eof))?;
    let mut end = pos;
    // EOL before endstream belongs to the syntax, not the data
    if end > 0 && input[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && input[end - 1] == b'\r' {
        end -= 1;
    }
    Ok((&input[pos + b"endstream".len()..], input[..end].to_vec()))
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((after, Token::ArrayEnd)) => return Ok((after, Object::Array(objects))),
            Ok(_) => {
                let (after, obj) = parse_object(remaining)?;
                objects.push(obj);
                remaining = after;
            },
            Err(e) => return Err(e),
        }
    }
}

fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining)? {
            (after, Token::DictEnd) => return Ok((after, dict)),
            (after, Token::Name(key)) => {
                let (after_value, value) = parse_object(after)?;
                dict.insert(key, value);
                remaining = after_value;
            },
            _ => return Err(nom_error(remaining, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Parse `id gen obj <object> endobj` at the start of `input`.
pub fn parse_indirect_object(input: &[u8]) -> Result<(ObjectRef, Object)> {
    let parse_err = |reason: &str| Error::ParseError {
        offset: 0,
        reason: reason.to_string(),
    };

    let (rest, id) = match token(input) {
        Ok((rest, Token::Integer(id))) if id >= 0 => (rest, id as u32),
        _ => return Err(parse_err("expected object number")),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(gen))) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return Err(parse_err("expected generation number")),
    };
    let rest = match token(rest) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(parse_err("expected 'obj' keyword")),
    };
    let (_, object) = parse_object(rest)
        .map_err(|e| parse_err(&format!("object {} {}: {}", id, gen, e)))?;

    Ok((ObjectRef::new(id, gen), object))
}
