//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! ISO 32000-1:2008 section 7.3. Output is deterministic: dictionary keys are
//! written in sorted order, so the same object always yields the same bytes.

use crate::object::{Dictionary, Object, ObjectRef};

/// Serializer for PDF objects.
///
/// Writes into a `Vec<u8>`, which cannot fail, so the public methods return
/// plain byte buffers.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a serializer that puts each dictionary entry on its own line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for logging and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, w: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => w.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => w.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_real(&self, w: &mut Vec<u8>, value: f64) {
        if value.fract() == 0.0 {
            w.extend_from_slice((value as i64).to_string().as_bytes());
        } else {
            let formatted = format!("{:.5}", value);
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            w.extend_from_slice(trimmed.as_bytes());
        }
    }

    /// Literal `(...)` syntax for printable ASCII, hex `<...>` otherwise.
    ///
    /// Signature placeholders rely on the hex branch: a `/Contents` value of
    /// zero bytes serializes as `<0000...>`.
    fn write_string(&self, w: &mut Vec<u8>, data: &[u8]) {
        let is_printable = data
            .iter()
            .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

        if is_printable {
            w.push(b'(');
            for &byte in data {
                match byte {
                    b'(' => w.extend_from_slice(b"\\("),
                    b')' => w.extend_from_slice(b"\\)"),
                    b'\\' => w.extend_from_slice(b"\\\\"),
                    b'\n' => w.extend_from_slice(b"\\n"),
                    b'\r' => w.extend_from_slice(b"\\r"),
                    b'\t' => w.extend_from_slice(b"\\t"),
                    _ => w.push(byte),
                }
            }
            w.push(b')');
        } else {
            w.push(b'<');
            w.extend_from_slice(hex::encode_upper(data).as_bytes());
            w.push(b'>');
        }
    }

    /// Names start with `/`; delimiters, whitespace and non-ASCII bytes are escaped as `#xx`.
    fn write_name(&self, w: &mut Vec<u8>, name: &str) {
        w.push(b'/');
        for byte in name.bytes() {
            match byte {
                b'!'
                | b'"'
                | b'$'
                | b'&'
                | b'\''
                | b'*'..=b'.'
                | b'0'..=b'9'
                | b';'
                | b'='
                | b'?'
                | b'@'
                | b'A'..=b'Z'
                | b'\\'
                | b'^'..=b'z'
                | b'|'
                | b'~' => w.push(byte),
                _ => w.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
            }
        }
    }

    fn write_array(&self, w: &mut Vec<u8>, arr: &[Object]) {
        w.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                w.push(b' ');
            }
            self.write_object(w, obj);
        }
        w.push(b']');
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dictionary) {
        w.extend_from_slice(b"<<");

        let mut keys: Vec<_> = dict.keys().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = dict.get(key) {
                w.extend_from_slice(if self.compact { b" " } else { b"\n  " });
                self.write_name(w, key);
                w.push(b' ');
                self.write_object(w, value);
            }
        }

        w.extend_from_slice(if self.compact || dict.is_empty() { b" >>" } else { b"\n>>" });
    }

    /// `/Length` always reflects the bytes actually written.
    fn write_stream(&self, w: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        let mut dict_with_length = dict.clone();
        dict_with_length.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict_with_length);
        w.extend_from_slice(b"\nstream\n");
        w.extend_from_slice(data);
        w.extend_from_slice(b"\nendstream");
    }
}

/// Helper functions for building PDF objects.
impl ObjectSerializer {
    /// Create a Name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Create a String object from a Rust string.
    pub fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec())
    }

    /// Create an Integer object.
    pub fn integer(i: i64) -> Object {
        Object::Integer(i)
    }

    /// Create a Dictionary object.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Create a Reference object.
    pub fn reference(r: ObjectRef) -> Object {
        Object::Reference(r)
    }

    /// Create an unfiltered stream holding raw bytes (DSS certificates, CRLs, OCSP responses).
    pub fn raw_stream(data: Vec<u8>) -> Object {
        Object::Stream {
            dict: Dictionary::new(),
            data: bytes::Bytes::from(data),
        }
    }
}
