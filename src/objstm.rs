//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) holds `/N` objects. Its decoded data
//! starts with `N` pairs of integers (object number, offset relative to
//! `/First`), followed by the objects themselves.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parsed contents of one object stream.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: HashMap<u32, Object>,
    order: Vec<u32>,
}

impl ObjectStream {
    /// Object with the given number, if the stream holds it.
    pub fn get(&self, id: u32) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Object at the given index (the xref stores indices for compressed entries).
    pub fn get_by_index(&self, index: usize) -> Option<(u32, &Object)> {
        let id = *self.order.get(index)?;
        self.objects.get(&id).map(|o| (id, o))
    }

    /// Object numbers in stream order.
    pub fn object_numbers(&self) -> &[u32] {
        &self.order
    }
}

/// Parse an object stream and extract all objects.
pub fn parse_object_stream(stream_obj: &Object) -> Result<ObjectStream> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(kind) = dict.get("Type").and_then(|o| o.as_name()) {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", kind)));
        }
    }

    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=1_000_000).contains(&n) || first < 0 {
        return Err(Error::InvalidPdf(format!("invalid object stream /N {} /First {}", n, first)));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n)?;
    let body = &decoded[first..];
    let mut stream = ObjectStream::default();

    for (obj_num, offset) in pairs {
        let Some(data) = body.get(offset..) else {
            log::warn!("object {} offset {} is beyond object stream data", obj_num, offset);
            continue;
        };
        match parse_object(data) {
            Ok((_, obj)) => {
                stream.order.push(obj_num);
                stream.objects.insert(obj_num, obj);
            },
            Err(e) => log::warn!("failed to parse object {} from object stream: {:?}", obj_num, e),
        }
    }

    Ok(stream)
}

/// Parse the `N` (object number, offset) pairs that precede `/First`.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut numbers = data
        .split(|c| crate::lexer::is_whitespace(*c))
        .filter(|w| !w.is_empty())
        .map(|w| std::str::from_utf8(w).ok().and_then(|s| s.parse::<u64>().ok()));

    let mut pairs = Vec::with_capacity(count);
    for i in 0..count {
        let (Some(Some(obj_num)), Some(Some(offset))) = (numbers.next(), numbers.next()) else {
            return Err(Error::ParseError {
                offset: 0,
                reason: format!("malformed object stream header at pair {}", i),
            });
        };
        pairs.push((obj_num as u32, offset as usize));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;
    use bytes::Bytes;

    fn objstm(header: &str, body: &str) -> Object {
        let data = format!("{}{}", header, body);
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("N".to_string(), Object::Integer(2));
        dict.insert("First".to_string(), Object::Integer(header.len() as i64));
        Object::Stream {
            dict,
            data: Bytes::from(data.into_bytes()),
        }
    }

    #[test]
    fn test_parse_object_number_pairs_with_whitespace() {
        let pairs = parse_object_number_pairs(b"  10   0   11  15 ", 2).unwrap();
        assert_eq!(pairs, vec![(10, 0), (11, 15)]);
    }

    #[test]
    fn test_parse_object_number_pairs_too_short() {
        assert!(parse_object_number_pairs(b"10 0 11", 2).is_err());
    }

    #[test]
    fn test_parse_object_stream() {
        let stream = objstm("4 0 5 26 ", "<< /Type /Catalog /X 1 >> << /Type /Pages >>");
        let parsed = parse_object_stream(&stream).unwrap();
        assert_eq!(parsed.object_numbers(), &[4, 5]);
        assert_eq!(parsed.get(4).and_then(|o| o.get("Type")).and_then(|o| o.as_name()), Some("Catalog"));
        let (id, obj) = parsed.get_by_index(1).unwrap();
        assert_eq!(id, 5);
        assert_eq!(obj.get("Type").and_then(|o| o.as_name()), Some("Pages"));
    }

    #[test]
    fn test_rejects_non_objstm() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        let stream = Object::Stream {
            dict,
            data: Bytes::new(),
        };
        assert!(parse_object_stream(&stream).is_err());
    }
}
