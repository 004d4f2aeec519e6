//! Raw object-header scanning.
//!
//! The byte buffer is scanned for `N G obj` markers. This serves two callers:
//! cross-reference reconstruction for files whose xref is damaged, and the
//! "true maximum object number" used before registering new objects in an
//! incremental update (the xref view undercounts after some prior updates,
//! notably when object streams are present).

use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::parse_object;
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;

lazy_static! {
    /// "N G obj" headers
    static ref RE_OBJ_PATTERN: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)(\d+)\s+(\d+)\s+obj\b").expect("static regex");

    /// "trailer <<" keyword
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("static regex");
}

/// An `N G obj` header found in the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
    /// Byte offset of the first digit of `N`
    pub offset: usize,
}

/// Every `N G obj` header in `pdf`, in file order.
pub fn scan_object_headers(pdf: &[u8]) -> Vec<ObjectHeader> {
    RE_OBJ_PATTERN
        .captures_iter(pdf)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?.parse().ok()?;
            let gen = std::str::from_utf8(caps.get(2)?.as_bytes()).ok()?.parse().ok()?;
            Some(ObjectHeader {
                id,
                gen,
                offset: whole.start(),
            })
        })
        .collect()
}

/// Largest object number defined anywhere in the raw bytes.
pub fn scan_max_object_number(pdf: &[u8]) -> u32 {
    scan_object_headers(pdf).iter().map(|h| h.id).max().unwrap_or(0)
}

/// Rebuild a cross-reference table by scanning for object headers.
///
/// Later definitions of the same object number win, matching incremental
/// update semantics. The trailer is taken from the last `trailer <<` keyword,
/// or synthesized from the last `/Type /Catalog` object.
pub fn reconstruct_xref(pdf: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", pdf.len());

    let headers = scan_object_headers(pdf);
    if headers.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    let mut xref = CrossRefTable::new();
    let mut catalog = None;
    for header in &headers {
        xref.add_entry(
            header.id,
            XRefEntry::Uncompressed {
                offset: header.offset as u64,
                generation: header.gen,
            },
        );
        if let Ok((_, obj)) = crate::parser::parse_indirect_object(&pdf[header.offset..]) {
            if obj.get("Type").and_then(|o| o.as_name()) == Some("Catalog") {
                catalog = Some(obj_ref(header));
            }
        }
    }

    let trailer = RE_TRAILER
        .find_iter(pdf)
        .last()
        .and_then(|m| parse_object(&pdf[m.start() + b"trailer".len()..]).ok())
        .and_then(|(_, obj)| match obj {
            Object::Dictionary(d) if d.contains_key("Root") => Some(d),
            _ => None,
        });

    let trailer = match (trailer, catalog) {
        (Some(t), _) => t,
        (None, Some(root)) => {
            let mut t = crate::object::Dictionary::new();
            t.insert("Root".to_string(), Object::Reference(root));
            t
        },
        (None, None) => {
            return Err(Error::InvalidPdf("could not identify document catalog".to_string()));
        },
    };

    let size = headers.iter().map(|h| h.id).max().unwrap_or(0) as i64 + 1;
    let mut trailer = trailer;
    trailer.insert("Size".to_string(), Object::Integer(size));
    trailer.remove("Prev");
    xref.set_trailer(trailer);

    log::info!("Reconstructed {} objects", xref.len());
    Ok(xref)
}

fn obj_ref(header: &ObjectHeader) -> crate::object::ObjectRef {
    crate::object::ObjectRef::new(header.id, header.gen)
}
