//! ByteRange handling for signature placeholders.
//!
//! A signature dictionary's `/ByteRange` is an array of four integers
//! `[offset1, length1, offset2, length2]` that covers the whole file except
//! the `/Contents` hex string:
//!
//! - `offset1` = 0 (start of file)
//! - `length1` = offset of the `<` opening the contents string
//! - `offset2` = offset just after the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! The final values are only known once the incremental update has been
//! written, so the dictionary is first written with a wide placeholder array
//! and patched in place afterwards, padded with spaces to the same width.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::timestamp::HashAlgorithm;

/// Sentinel written in place of each unknown ByteRange value.
pub const PLACEHOLDER_VALUE: i64 = 9_999_999_999;

/// Serialized form of the placeholder array.
pub const PLACEHOLDER_ARRAY: &str = "[0 9999999999 9999999999 9999999999]";

/// How far past the signature dictionary offset to search for its entries.
const SEARCH_WINDOW: usize = 256 * 1024;

/// A `/ByteRange` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ByteRange(pub [usize; 4]);

impl ByteRange {
    /// Placeholder array object for a fresh signature dictionary.
    pub fn placeholder_object() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(PLACEHOLDER_VALUE),
            Object::Integer(PLACEHOLDER_VALUE),
            Object::Integer(PLACEHOLDER_VALUE),
        ])
    }

    /// Range excluding the contents string `<...>` spanning `[lt, gt]` inclusive.
    pub fn around_contents(file_size: usize, lt: usize, gt: usize) -> Self {
        let after = gt + 1;
        Self([0, lt, after, file_size.saturating_sub(after)])
    }

    /// Read a `/ByteRange` array. Placeholder sentinels and negative values are rejected.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let values = obj
            .as_array()
            .ok_or_else(|| Error::InvalidPdf("/ByteRange is not an array".to_string()))?;
        if values.len() != 4 {
            return Err(Error::InvalidPdf(format!("/ByteRange has {} entries, expected 4", values.len())));
        }
        let mut out = [0usize; 4];
        for (slot, value) in out.iter_mut().zip(values) {
            let n = value
                .as_integer()
                .ok_or_else(|| Error::InvalidPdf("/ByteRange entry is not an integer".to_string()))?;
            if n < 0 || n == PLACEHOLDER_VALUE {
                return Err(Error::InvalidPdf(format!("/ByteRange entry {} is not a real offset", n)));
            }
            *slot = n as usize;
        }
        Ok(Self(out))
    }

    /// Array text, e.g. `[0 840 17226 1120]`.
    pub fn to_pdf_string(&self) -> String {
        format!("[{} {} {} {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }

    /// The two covered spans of `data`.
    pub fn spans<'a>(&self, data: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        let [offset1, length1, offset2, length2] = self.0;
        let first = offset1
            .checked_add(length1)
            .filter(|&end| end <= data.len())
            .map(|end| &data[offset1..end])
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange first range exceeds file size: {} + {} > {}",
                    offset1,
                    length1,
                    data.len()
                ))
            })?;
        let second = offset2
            .checked_add(length2)
            .filter(|&end| end <= data.len())
            .map(|end| &data[offset2..end])
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange second range exceeds file size: {} + {} > {}",
                    offset2,
                    length2,
                    data.len()
                ))
            })?;
        Ok((first, second))
    }

    /// Bytes covered by the range, concatenated.
    pub fn signed_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (first, second) = self.spans(data)?;
        let mut out = Vec::with_capacity(first.len() + second.len());
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        Ok(out)
    }

    /// Digest of the covered bytes.
    pub fn digest(&self, data: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        let (first, second) = self.spans(data)?;
        Ok(algorithm.digest_parts(&[first, second]))
    }

    /// Whether the range starts at 0, ends at `file_size`, and leaves a gap for the contents.
    pub fn validate(&self, file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = self.0;
        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if offset2.saturating_add(length2) != file_size {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                file_size,
                offset2.saturating_add(length2)
            )));
        }
        if length1 >= offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }
        Ok(())
    }

    /// Whether the range reaches the end of a file of `file_size` bytes.
    pub fn covers_to_end(&self, file_size: usize) -> bool {
        self.0[2].saturating_add(self.0[3]) == file_size
    }
}

fn window(data: &[u8], from: usize) -> &[u8] {
    let start = from.min(data.len());
    let end = start.saturating_add(SEARCH_WINDOW).min(data.len());
    &data[start..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate the `<...>` of `/Contents` at or after `from`, returning the offsets of `<` and `>`.
pub fn find_contents(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let search = window(data, from);
    let mut pos = 0;
    while let Some(found) = find(&search[pos..], b"/Contents") {
        let after = pos + found + b"/Contents".len();
        let mut i = after;
        while i < search.len() && matches!(search[i], b' ' | b'\t' | b'\n' | b'\r') {
            i += 1;
        }
        if search.get(i) == Some(&b'<') {
            let lt = i;
            let gt = search[lt..].iter().position(|&b| b == b'>')? + lt;
            return Some((from + lt, from + gt));
        }
        pos = after;
    }
    None
}

/// Locate the placeholder `/ByteRange` array at or after `from`.
///
/// Searching from the current signature dictionary keeps a chained
/// signature from matching an earlier, already-patched array.
pub fn find_byte_range_placeholder(data: &[u8], from: usize) -> Option<usize> {
    find(window(data, from), PLACEHOLDER_ARRAY.as_bytes()).map(|i| from + i)
}

/// Overwrite the placeholder array at `pos` with `range`, space-padded to the same width.
pub fn patch_byte_range(data: &mut [u8], pos: usize, range: &ByteRange) -> Result<()> {
    let width = PLACEHOLDER_ARRAY.len();
    if data.get(pos..pos + width) != Some(PLACEHOLDER_ARRAY.as_bytes()) {
        return Err(Error::InvalidPdf(format!("no ByteRange placeholder at offset {}", pos)));
    }
    let text = range.to_pdf_string();
    if text.len() > width {
        return Err(Error::InvalidPdf(format!(
            "ByteRange {} does not fit the {} byte placeholder",
            text, width
        )));
    }
    let slot = &mut data[pos..pos + width];
    slot.fill(b' ');
    slot[..text.len()].copy_from_slice(text.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_around_contents() {
        // "XX<0000>YY": '<' at 2, '>' at 7
        let range = ByteRange::around_contents(10, 2, 7);
        assert_eq!(range.0, [0, 2, 8, 2]);
        assert_eq!(range.signed_bytes(b"XX<0000>YY").unwrap(), b"XXYY");
        range.validate(10).unwrap();
    }

    #[test]
    fn test_spans_out_of_bounds() {
        let range = ByteRange([0, 3, 6, 10]);
        assert!(range.spans(b"AAABBBCCC").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(ByteRange([10, 100, 150, 50]).validate(200).is_err());
        assert!(ByteRange([0, 100, 150, 100]).validate(200).is_err());
        assert!(ByteRange([0, 150, 150, 50]).validate(200).is_err());
    }

    #[test]
    fn test_from_object_rejects_placeholder() {
        assert!(ByteRange::from_object(&ByteRange::placeholder_object()).is_err());
        let real = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(10),
            Object::Integer(20),
            Object::Integer(5),
        ]);
        assert_eq!(ByteRange::from_object(&real).unwrap().0, [0, 10, 20, 5]);
    }

    #[test]
    fn test_patch_keeps_width() {
        let mut data = format!("/ByteRange {} /Contents <00>", PLACEHOLDER_ARRAY).into_bytes();
        let len = data.len();
        let pos = find_byte_range_placeholder(&data, 0).unwrap();
        assert_eq!(pos, 11);
        patch_byte_range(&mut data, pos, &ByteRange([0, 1, 2, 3])).unwrap();
        assert_eq!(data.len(), len);
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("/ByteRange [0 1 2 3] "));
        assert!(!text.contains("9999999999"));
    }

    #[test]
    fn test_search_starts_at_hint() {
        let data = format!("{} ... {}", PLACEHOLDER_ARRAY, PLACEHOLDER_ARRAY).into_bytes();
        let second = find_byte_range_placeholder(&data, 1).unwrap();
        assert_eq!(second, PLACEHOLDER_ARRAY.len() + 5);
    }

    #[test]
    fn test_find_contents() {
        let data = b"<< /Contents (x) >> << /Contents <00AB> >>";
        let (lt, gt) = find_contents(data, 0).unwrap();
        assert_eq!(&data[lt..=gt], b"<00AB>");
        assert!(find_contents(data, gt).is_none());
    }
}
