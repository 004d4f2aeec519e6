//! Cross-reference table parser.
//!
//! Maps object numbers to byte offsets (or object-stream slots). Supports
//! classic tables, cross-reference streams (PDF 1.5+), hybrid `/XRefStm`
//! files and `/Prev` chains left behind by incremental updates.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::parse_indirect_object;
use std::collections::HashMap;

/// Guard against circular `/Prev` chains.
const MAX_PREV_DEPTH: u32 = 100;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object
    Free,
    /// Uncompressed object at a byte offset
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored in an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream_id: u32,
        /// Index within the stream
        index: u32,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<Dictionary>,
    /// Whether the newest section was a cross-reference stream
    uses_xref_stream: bool,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Add (or replace) an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Largest object number that is in use.
    pub fn max_in_use(&self) -> Option<u32> {
        self.entries
            .iter()
            .filter(|(_, e)| !matches!(e, XRefEntry::Free))
            .map(|(k, _)| *k)
            .max()
    }

    /// Whether the newest section is a cross-reference stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.uses_xref_stream
    }

    /// Merge an older section: entries already present win.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (obj_num, entry) in older.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Offset that follows the last `startxref` keyword.
pub fn find_xref_offset(pdf: &[u8]) -> Result<u64> {
    let tail_start = pdf.len().saturating_sub(2048);
    let tail = &pdf[tail_start..];
    let pos = tail
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;

    let mut cursor = tail_start + pos + b"startxref".len();
    let word = next_word(pdf, &mut cursor).ok_or(Error::InvalidXref)?;
    parse_u64(word).ok_or(Error::InvalidXref)
}

/// Parse the cross-reference chain starting at `offset`.
pub fn parse_xref(pdf: &[u8], offset: u64) -> Result<CrossRefTable> {
    parse_xref_recursive(pdf, offset, 0)
}

fn parse_xref_recursive(pdf: &[u8], offset: u64, depth: u32) -> Result<CrossRefTable> {
    if depth > MAX_PREV_DEPTH {
        return Err(Error::InvalidPdf(format!("xref /Prev chain deeper than {}", MAX_PREV_DEPTH)));
    }
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    if start >= pdf.len() {
        return Err(Error::InvalidPdf(format!("xref offset {} beyond end of file", offset)));
    }

    let body = crate::lexer::skip_ws(&pdf[start..]);
    let mut xref = if body.starts_with(b"xref") {
        log::debug!("classic xref at offset {}", offset);
        let mut table = parse_traditional_xref(pdf, start)?;
        // Hybrid files keep compressed entries in a side stream
        if let Some(stm_offset) = table
            .trailer()
            .and_then(|t| t.get("XRefStm"))
            .and_then(|o| o.as_integer())
        {
            match parse_xref_stream(pdf, stm_offset as u64) {
                Ok(side) => {
                    for (num, entry) in side.entries {
                        table.entries.entry(num).or_insert(entry);
                    }
                },
                Err(e) => log::warn!("ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }
        table
    } else {
        log::debug!("xref stream at offset {}", offset);
        parse_xref_stream(pdf, offset)?
    };

    let prev = xref.trailer().and_then(|t| t.get("Prev")).and_then(|o| o.as_integer());
    if let Some(prev) = prev {
        if prev >= 0 && prev as u64 != offset {
            let older = parse_xref_recursive(pdf, prev as u64, depth + 1)?;
            xref.merge_from(older);
        }
    }

    Ok(xref)
}

/// Parse a classic table:
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(pdf: &[u8], start: usize) -> Result<CrossRefTable> {
    let mut xref = CrossRefTable::new();
    let mut cursor = start;

    match next_word(pdf, &mut cursor) {
        Some(b"xref") => {},
        _ => return Err(Error::InvalidXref),
    }

    loop {
        let word = next_word(pdf, &mut cursor).ok_or(Error::InvalidXref)?;
        if word.starts_with(b"trailer") {
            let after = cursor - word.len() + b"trailer".len();
            let (_, trailer) = crate::parser::parse_object(&pdf[after..]).map_err(|e| Error::ParseError {
                offset: after,
                reason: format!("trailer dictionary: {}", e),
            })?;
            match trailer {
                Object::Dictionary(dict) => xref.set_trailer(dict),
                other => {
                    return Err(Error::InvalidPdf(format!("trailer is a {}", other.type_name())));
                },
            }
            return Ok(xref);
        }

        let first = parse_u64(word).ok_or(Error::InvalidXref)? as u32;
        let count = next_word(pdf, &mut cursor)
            .and_then(parse_u64)
            .ok_or(Error::InvalidXref)? as u32;
        if count > 10_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        for i in 0..count {
            let offset = next_word(pdf, &mut cursor).and_then(parse_u64);
            let generation = next_word(pdf, &mut cursor).and_then(parse_u64);
            let kind = next_word(pdf, &mut cursor);
            let (Some(offset), Some(generation), Some(kind)) = (offset, generation, kind) else {
                return Err(Error::InvalidPdf(format!("truncated xref entry {}", first + i)));
            };
            let entry = match kind.first() {
                Some(b'n') => XRefEntry::Uncompressed {
                    offset,
                    generation: generation.min(u16::MAX as u64) as u16,
                },
                _ => XRefEntry::Free,
            };
            let id = first.checked_add(i).ok_or(Error::InvalidXref)?;
            xref.add_entry(id, entry);
        }
    }
}

/// Parse a `/Type /XRef` stream object at `offset`.
fn parse_xref_stream(pdf: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    let slice = pdf.get(start..).ok_or(Error::InvalidXref)?;
    let (_, obj) = parse_indirect_object(slice)?;

    let dict = obj
        .as_dict()
        .ok_or_else(|| Error::InvalidPdf("xref stream is not a stream object".to_string()))?;
    if let Some(kind) = dict.get("Type").and_then(|o| o.as_name()) {
        if kind != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /Type /{}", kind)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?
        .iter()
        .map(|o| o.as_integer().unwrap_or(0).max(0) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array length".to_string()));
    }
    if widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf(format!("xref stream field width in {:?} exceeds 8 bytes", widths)));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::InvalidPdf("zero-width xref stream entries".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;
    let size = u32::try_from(size).map_err(|_| Error::InvalidXref)?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| {
                let number = |o: &Object| o.as_integer().and_then(|n| u32::try_from(n).ok());
                match (number(&pair[0]), number(&pair[1])) {
                    (Some(first), Some(count)) => Ok((first, count)),
                    _ => Err(Error::InvalidXref),
                }
            })
            .collect::<Result<_>>()?,
        None => vec![(0, size)],
    };

    let data = obj.decode_stream_data()?;
    let mut xref = CrossRefTable::new();
    let mut rows = data.chunks_exact(entry_size);

    for (first, count) in ranges {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let kind = if w1 == 0 { 1 } else { read_int(&row[..w1]) };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);

            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are treated as null references
                _ => XRefEntry::Free,
            };
            let id = first.checked_add(i).ok_or(Error::InvalidXref)?;
            xref.add_entry(id, entry);
        }
    }

    if let Object::Stream { dict, .. } = obj {
        xref.set_trailer(dict);
    }
    xref.uses_xref_stream = true;
    Ok(xref)
}

/// Big-endian integer from a byte field.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn parse_u64(word: &[u8]) -> Option<u64> {
    std::str::from_utf8(word).ok()?.parse().ok()
}

/// Next whitespace-delimited word starting at `cursor` (handles CR, LF and CRLF alike).
fn next_word<'a>(pdf: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    let rest = pdf.get(*cursor..)?;
    let start = rest.iter().position(|c| !crate::lexer::is_whitespace(*c))?;
    let len = rest[start..]
        .iter()
        .position(|c| crate::lexer::is_whitespace(*c))
        .unwrap_or(rest.len() - start);
    *cursor += start + len;
    Some(&rest[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_xref_offset_valid() {
        let pdf = b"%PDF-1.4\n...\nstartxref\n1234\n%%EOF\n";
        assert_eq!(find_xref_offset(pdf).unwrap(), 1234);
    }

    #[test]
    fn test_find_xref_offset_uses_last_occurrence() {
        let pdf = b"%PDF-1.4\nstartxref\n10\n%%EOF\nmore\nstartxref\r99\r%%EOF";
        assert_eq!(find_xref_offset(pdf).unwrap(), 99);
    }

    #[test]
    fn test_find_xref_offset_no_startxref() {
        assert!(matches!(find_xref_offset(b"%PDF-1.4\n%%EOF"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_xref_single_subsection() {
        let pdf = b"xref\n0 3\n0000000000 65535 f \n0000000018 00000 n \n0000000154 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF";
        let xref = parse_xref(pdf, 0).unwrap();
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        assert_eq!(
            xref.get(2),
            Some(&XRefEntry::Uncompressed {
                offset: 154,
                generation: 0
            })
        );
        assert_eq!(xref.trailer().and_then(|t| t.get("Size")).and_then(|o| o.as_integer()), Some(3));
        assert_eq!(xref.max_in_use(), Some(2));
    }

    #[test]
    fn test_parse_xref_multiple_subsections_cr_only() {
        let pdf = b"xref\r0 1\r0000000000 65535 f\r5 1\r0000000099 00000 n\rtrailer\r<< /Size 6 >>\r";
        let xref = parse_xref(pdf, 0).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(
            xref.get(5),
            Some(&XRefEntry::Uncompressed {
                offset: 99,
                generation: 0
            })
        );
    }

    #[test]
    fn test_parse_xref_stream_uncompressed() {
        // Three entries, /W [1 2 1]
        let rows: Vec<u8> = vec![0, 0, 0, 0, 1, 0, 10, 0, 2, 0, 4, 1];
        let mut pdf = format!(
            "9 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .into_bytes();
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");

        let xref = parse_xref(&pdf, 0).unwrap();
        assert!(xref.uses_xref_stream());
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 10,
                generation: 0
            })
        );
        assert_eq!(xref.get(2), Some(&XRefEntry::Compressed { stream_id: 4, index: 1 }));
    }

    fn xref_stream(dict_entries: &str, rows: &[u8]) -> Vec<u8> {
        let mut pdf = format!(
            "9 0 obj\n<< /Type /XRef {} /Root 1 0 R /Length {} >>\nstream\n",
            dict_entries,
            rows.len()
        )
        .into_bytes();
        pdf.extend_from_slice(rows);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf
    }

    #[test]
    fn test_xref_stream_index_overflow() {
        let rows = [1u8, 0, 10, 0, 1, 0, 20, 0];
        let pdf = xref_stream("/Size 2 /W [1 2 1] /Index [4294967295 2]", &rows);
        assert!(matches!(parse_xref(&pdf, 0), Err(Error::InvalidXref)));

        let pdf = xref_stream("/Size 2 /W [1 2 1] /Index [-1 2]", &rows);
        assert!(matches!(parse_xref(&pdf, 0), Err(Error::InvalidXref)));

        let pdf = xref_stream("/Size 2 /W [1 2 1] /Index [4294967294 2]", &rows);
        let xref = parse_xref(&pdf, 0).unwrap();
        assert_eq!(
            xref.get(u32::MAX),
            Some(&XRefEntry::Uncompressed {
                offset: 20,
                generation: 0
            })
        );
    }

    #[test]
    fn test_xref_stream_rejects_wide_fields() {
        let pdf = xref_stream("/Size 1 /W [1 9 1]", &[0u8; 11]);
        assert!(parse_xref(&pdf, 0).is_err());
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let old = b"xref\n0 2\n0000000000 65535 f \n0000000011 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n";
        let mut pdf = old.to_vec();
        let newer_offset = pdf.len();
        pdf.extend_from_slice(
            b"xref\n1 1\n0000000077 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev 0 >>\n",
        );
        let xref = parse_xref(&pdf, newer_offset as u64).unwrap();
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 77,
                generation: 0
            })
        );
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
    }
}
