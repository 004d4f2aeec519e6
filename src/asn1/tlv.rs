//! Minimal BER/DER tag-length-value reader.
//!
//! Used where a schema decoder is too strict or where the exact encoded bytes
//! matter: positional extraction from non-conformant TSA responses, the raw
//! signed attributes of a CMS signer (which are signed as encoded), and the
//! DER length of a `/Contents` token that is followed by zero padding.
//! Only low tag numbers are supported; indefinite lengths are accepted for
//! constructed values.

use crate::error::{Error, Result};

/// Universal tags used by callers.
pub mod tag {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const OID: u8 = 0x06;
    pub const ENUMERATED: u8 = 0x0A;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
}

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Identifier octet
    pub tag: u8,
    /// Content octets (without end-of-contents for indefinite lengths)
    pub value: &'a [u8],
    /// Complete encoding, header included
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Whether the constructed bit is set.
    pub fn is_constructed(&self) -> bool {
        self.tag & 0x20 != 0
    }

    /// Whether this is a context-specific tag `[n]`.
    pub fn is_context(&self, n: u8) -> bool {
        self.tag & 0xC0 == 0x80 && self.tag & 0x1F == n
    }

    /// Child elements of a constructed value.
    pub fn children(&self) -> Result<Vec<Tlv<'a>>> {
        read_all(self.value)
    }

    /// Child at `index`, failing with a descriptive error when absent.
    pub fn child(&self, index: usize, what: &str) -> Result<Tlv<'a>> {
        self.children()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::Asn1(format!("missing {}", what)))
    }

    /// The value as an unsigned integer (INTEGER or ENUMERATED up to 8 bytes).
    pub fn as_u64(&self) -> Result<u64> {
        if self.tag != tag::INTEGER && self.tag != tag::ENUMERATED {
            return Err(Error::Asn1(format!("expected INTEGER, found tag 0x{:02X}", self.tag)));
        }
        let bytes = strip_leading_zeros(self.value);
        if bytes.len() > 8 || self.value.first().is_some_and(|b| b & 0x80 != 0) {
            return Err(Error::Asn1("integer out of range".to_string()));
        }
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}

/// Deepest indefinite-length nesting accepted.
pub const MAX_INDEFINITE_DEPTH: usize = 64;

/// Read one element from the front of `input`.
pub fn read_tlv(input: &[u8]) -> Result<(Tlv<'_>, &[u8])> {
    read_nested(input, 0)
}

fn read_nested(input: &[u8], depth: usize) -> Result<(Tlv<'_>, &[u8])> {
    let tag = *input.first().ok_or_else(|| Error::Asn1("unexpected end of data".to_string()))?;
    if tag & 0x1F == 0x1F {
        return Err(Error::Asn1("high tag numbers are not supported".to_string()));
    }
    let len_byte = *input.get(1).ok_or_else(|| Error::Asn1("truncated length".to_string()))?;

    if len_byte == 0x80 {
        if tag & 0x20 == 0 {
            return Err(Error::Asn1("indefinite length on a primitive value".to_string()));
        }
        if depth >= MAX_INDEFINITE_DEPTH {
            return Err(Error::Asn1("nesting too deep".to_string()));
        }
        // Scan children until end-of-contents
        let mut rest = &input[2..];
        let mut consumed = 2;
        loop {
            if rest.starts_with(&[0, 0]) {
                let value = &input[2..consumed];
                let raw = &input[..consumed + 2];
                return Ok((Tlv { tag, value, raw }, &input[consumed + 2..]));
            }
            let (child, after) = read_nested(rest, depth + 1)?;
            consumed += child.raw.len();
            rest = after;
        }
    }

    let (length, header_len) = if len_byte & 0x80 == 0 {
        (len_byte as usize, 2)
    } else {
        let n = (len_byte & 0x7F) as usize;
        if n > 4 {
            return Err(Error::Asn1(format!("length of {} octets is not supported", n)));
        }
        let bytes = input
            .get(2..2 + n)
            .ok_or_else(|| Error::Asn1("truncated length".to_string()))?;
        (bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize), 2 + n)
    };

    let end = header_len
        .checked_add(length)
        .filter(|&end| end <= input.len())
        .ok_or_else(|| {
            Error::Asn1(format!(
                "element of {} bytes exceeds the {} available",
                length,
                input.len().saturating_sub(header_len)
            ))
        })?;

    Ok((
        Tlv {
            tag,
            value: &input[header_len..end],
            raw: &input[..end],
        },
        &input[end..],
    ))
}

/// Read every element in `input`.
pub fn read_all(mut input: &[u8]) -> Result<Vec<Tlv<'_>>> {
    let mut out = Vec::new();
    while !input.is_empty() {
        let (tlv, rest) = read_tlv(input)?;
        out.push(tlv);
        input = rest;
    }
    Ok(out)
}

/// Total encoded length of the first element, e.g. to trim zero padding after a token.
pub fn encoded_len(input: &[u8]) -> Result<usize> {
    read_tlv(input).map(|(tlv, _)| tlv.raw.len())
}

/// Strip redundant leading zero octets of an INTEGER body.
pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
