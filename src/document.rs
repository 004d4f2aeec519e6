//! PDF document loading and object access.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::{parse_object_stream, ObjectStream};
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::{reconstruct_xref, scan_object_headers};
use std::collections::{HashMap, HashSet};

/// Maximum depth for reference chains and tree walks.
const MAX_RECURSION_DEPTH: usize = 64;

/// A terminal AcroForm field.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Indirect reference of the field dictionary
    pub reference: ObjectRef,
    /// Fully qualified name (`parent.child`)
    pub name: String,
    /// Field type (`/FT`), inherited from ancestors when absent
    pub field_type: Option<String>,
    /// Resolved `/V` value
    pub value: Option<Object>,
    /// Reference of the `/V` object when it is indirect
    pub value_ref: Option<ObjectRef>,
}

impl FormField {
    /// Whether this is a signature field (`/FT /Sig`).
    pub fn is_signature(&self) -> bool {
        self.field_type.as_deref() == Some("Sig")
    }
}

/// A loaded PDF document.
///
/// Holds the complete file in memory. Objects are parsed lazily on first
/// access and cached; objects inside object streams are cached per stream.
///
/// # Example
///
/// ```no_run
/// use pades_timestamp::document::PdfDocument;
///
/// let bytes = std::fs::read("sample.pdf")?;
/// let mut doc = PdfDocument::load(&bytes)?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// println!("Signature fields: {}", doc.acroform_fields()?.iter().filter(|f| f.is_signature()).count());
/// # Ok::<(), pades_timestamp::error::Error>(())
/// ```
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: Dictionary,
    /// Whether the xref was rebuilt by scanning (the file's own chain is unusable)
    reconstructed: bool,
    object_cache: HashMap<ObjectRef, Object>,
    object_streams: HashMap<u32, ObjectStream>,
    /// Last header offset per object number, built on first fallback lookup
    header_index: Option<HashMap<u32, usize>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("reconstructed", &self.reconstructed)
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Load a document from its bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHeader`] if the `%PDF-M.m` header is missing
    /// - [`Error::Encrypted`] if the trailer carries `/Encrypt`
    /// - a parse error if neither the xref chain nor a raw object scan yields a catalog
    pub fn load(data: &[u8]) -> Result<Self> {
        let version = parse_header(data)?;

        let (xref, reconstructed) = match Self::try_open_regular(data) {
            Ok(xref) => (xref, false),
            Err(e) => {
                log::warn!("Regular xref parsing failed: {}, attempting reconstruction", e);
                match reconstruct_xref(data) {
                    Ok(xref) => (xref, true),
                    Err(recon_err) => {
                        log::error!("XRef reconstruction also failed: {}", recon_err);
                        return Err(e);
                    },
                }
            },
        };

        let trailer = xref
            .trailer()
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("document has no trailer".to_string()))?;

        if trailer.contains_key("Encrypt") {
            return Err(Error::Encrypted);
        }

        log::debug!(
            "Loaded PDF {}.{} ({} bytes, {} xref entries{})",
            version.0,
            version.1,
            data.len(),
            xref.len(),
            if reconstructed { ", reconstructed" } else { "" }
        );

        Ok(Self {
            data: data.to_vec(),
            version,
            xref,
            trailer,
            reconstructed,
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
            header_index: None,
        })
    }

    /// Parse the xref chain; a table without `/Root` or without entries counts as unusable.
    fn try_open_regular(data: &[u8]) -> Result<CrossRefTable> {
        let offset = find_xref_offset(data)?;
        let xref = parse_xref(data, offset)?;
        if xref.is_empty() {
            return Err(Error::InvalidPdf("cross-reference table is empty".to_string()));
        }
        match xref.trailer().and_then(|t| t.get("Root")).and_then(|o| o.as_reference()) {
            Some(_) => Ok(xref),
            None => Err(Error::InvalidPdf("trailer missing /Root reference".to_string())),
        }
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Raw document bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Trailer dictionary of the newest cross-reference section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Cross-reference table (all sections merged).
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Whether the cross-reference table was rebuilt by scanning.
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Offset of the newest cross-reference section (`startxref`).
    pub fn startxref(&self) -> Result<u64> {
        find_xref_offset(&self.data)
    }

    /// Reference to the document catalog (`/Root`).
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer missing /Root reference".to_string()))
    }

    /// The document catalog.
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self.catalog_ref()?;
        match self.load_object(root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidPdf(format!("catalog is a {}", other.type_name()))),
        }
    }

    /// Largest object number defined anywhere in the document.
    ///
    /// Combines the raw `N G obj` scan with the xref view and trailer `/Size`,
    /// since the xref view alone undercounts after some incremental updates.
    pub fn max_object_number(&self) -> u32 {
        let scanned = crate::xref_reconstruction::scan_max_object_number(&self.data);
        let from_xref = self.xref.max_in_use().unwrap_or(0);
        let from_size = self
            .trailer
            .get("Size")
            .and_then(|o| o.as_integer())
            .map(|s| (s.max(1) - 1) as u32)
            .unwrap_or(0);
        scanned.max(from_xref).max(from_size)
    }

    /// Every object number that is defined in the bytes or in use in the xref.
    pub fn defined_object_numbers(&self) -> HashSet<u32> {
        let mut ids: HashSet<u32> = scan_object_headers(&self.data).iter().map(|h| h.id).collect();
        ids.extend(
            self.xref
                .iter()
                .filter(|(_, e)| !matches!(e, XRefEntry::Free))
                .map(|(id, _)| id),
        );
        ids
    }

    /// Load an indirect object.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(obj) = self.object_cache.get(&obj_ref) {
            return Ok(obj.clone());
        }

        let obj = match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::Uncompressed { offset, .. }) => self
                .load_at(obj_ref, offset as usize)
                .or_else(|e| {
                    log::debug!("object {} not at xref offset {}: {}, scanning", obj_ref, offset, e);
                    self.load_by_scan(obj_ref)
                })?,
            Some(XRefEntry::Compressed { stream_id, index }) => {
                self.load_compressed_object(obj_ref, stream_id, index)?
            },
            Some(XRefEntry::Free) | None => self.load_by_scan(obj_ref)?,
        };

        self.object_cache.insert(obj_ref, obj.clone());
        Ok(obj)
    }

    fn load_at(&self, obj_ref: ObjectRef, offset: usize) -> Result<Object> {
        let slice = self.data.get(offset..).ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
        let (found, obj) = parse_indirect_object(slice)?;
        if found.id != obj_ref.id {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object {}, found {}", obj_ref.id, found.id),
            });
        }
        Ok(obj)
    }

    fn load_by_scan(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        let index = self.header_index.get_or_insert_with(|| {
            scan_object_headers(&self.data)
                .into_iter()
                .map(|h| (h.id, h.offset))
                .collect()
        });
        let offset = *index
            .get(&obj_ref.id)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
        self.load_at(obj_ref, offset)
    }

    fn load_compressed_object(&mut self, obj_ref: ObjectRef, stream_id: u32, index: u32) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_id) {
            let stream_obj = self.load_object(ObjectRef::new(stream_id, 0))?;
            let parsed = parse_object_stream(&stream_obj)?;
            log::debug!("parsed object stream {} ({} objects)", stream_id, parsed.object_numbers().len());
            self.object_streams.insert(stream_id, parsed);
        }

        let stream = self
            .object_streams
            .get(&stream_id)
            .ok_or(Error::ObjectNotFound(stream_id, 0))?;
        match stream.get_by_index(index as usize) {
            Some((id, obj)) if id == obj_ref.id => Ok(obj.clone()),
            _ => stream
                .get(obj_ref.id)
                .cloned()
                .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Follow a reference chain to a direct object; direct objects are returned as-is.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_RECURSION_DEPTH {
            match current {
                Object::Reference(r) => current = self.load_object(r)?,
                direct => return Ok(direct),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve `key` in `dict` to a dictionary, if present.
    pub fn resolve_dict(&mut self, dict: &Dictionary, key: &str) -> Result<Option<Dictionary>> {
        match dict.get(key) {
            None => Ok(None),
            Some(value) => match self.resolve(value)? {
                Object::Dictionary(d) => Ok(Some(d)),
                Object::Stream { dict, .. } => Ok(Some(dict)),
                Object::Null => Ok(None),
                other => Err(Error::InvalidPdf(format!("/{} is a {}", key, other.type_name()))),
            },
        }
    }

    /// The first page of the page tree.
    pub fn first_page(&mut self) -> Result<Option<(ObjectRef, Dictionary)>> {
        let catalog = self.catalog()?;
        let mut node_ref = match catalog.get("Pages").and_then(|o| o.as_reference()) {
            Some(r) => r,
            None => return Ok(None),
        };

        let mut visited = HashSet::new();
        for _ in 0..MAX_RECURSION_DEPTH {
            if !visited.insert(node_ref) {
                return Err(Error::InvalidPdf(format!("cycle in page tree at {}", node_ref)));
            }
            let node = match self.load_object(node_ref)? {
                Object::Dictionary(d) => d,
                other => {
                    return Err(Error::InvalidPdf(format!("page tree node is a {}", other.type_name())));
                },
            };
            if node.get("Type").and_then(|o| o.as_name()) == Some("Page") || !node.contains_key("Kids") {
                return Ok(Some((node_ref, node)));
            }
            let first_kid = match node.get("Kids") {
                Some(kids) => match self.resolve(kids)? {
                    Object::Array(arr) => arr.first().and_then(|o| o.as_reference()),
                    _ => None,
                },
                None => None,
            };
            match first_kid {
                Some(kid) => node_ref = kid,
                None => return Ok(None),
            }
        }
        Err(Error::InvalidPdf("page tree too deep".to_string()))
    }

    /// All terminal AcroForm fields, depth first, in `/Fields` order.
    pub fn acroform_fields(&mut self) -> Result<Vec<FormField>> {
        let catalog = self.catalog()?;
        let acroform = match self.resolve_dict(&catalog, "AcroForm")? {
            Some(a) => a,
            None => return Ok(Vec::new()),
        };
        let roots = match acroform.get("Fields") {
            Some(fields) => match self.resolve(fields)? {
                Object::Array(arr) => arr,
                _ => Vec::new(),
            },
            None => Vec::new(),
        };

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for field in roots.iter().filter_map(|o| o.as_reference()) {
            self.collect_fields(field, "", None, 0, &mut visited, &mut out)?;
        }
        Ok(out)
    }

    fn collect_fields(
        &mut self,
        field_ref: ObjectRef,
        parent_name: &str,
        inherited_type: Option<&str>,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
        out: &mut Vec<FormField>,
    ) -> Result<()> {
        if depth > MAX_RECURSION_DEPTH || !visited.insert(field_ref) {
            log::warn!("skipping field {}: cycle or excessive nesting", field_ref);
            return Ok(());
        }
        let dict = match self.load_object(field_ref) {
            Ok(Object::Dictionary(d)) => d,
            Ok(_) => return Ok(()),
            Err(e) => {
                log::warn!("skipping unreadable form field {}: {}", field_ref, e);
                return Ok(());
            },
        };

        let partial = dict.get("T").and_then(|o| o.as_text());
        let name = match (&partial, parent_name.is_empty()) {
            (Some(t), true) => t.clone(),
            (Some(t), false) => format!("{}.{}", parent_name, t),
            (None, _) => parent_name.to_string(),
        };
        let field_type = dict
            .get("FT")
            .and_then(|o| o.as_name())
            .map(str::to_string)
            .or_else(|| inherited_type.map(str::to_string));

        // Kids with their own /T are child fields; kids without are widget annotations
        let kids: Vec<ObjectRef> = match dict.get("Kids") {
            Some(k) => match self.resolve(k)? {
                Object::Array(arr) => arr.iter().filter_map(|o| o.as_reference()).collect(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        let mut child_fields = Vec::new();
        for kid in kids {
            if let Ok(Object::Dictionary(kd)) = self.load_object(kid) {
                if kd.contains_key("T") {
                    child_fields.push(kid);
                }
            }
        }

        if child_fields.is_empty() {
            let value_ref = dict.get("V").and_then(|o| o.as_reference());
            let value = match dict.get("V") {
                Some(v) => Some(self.resolve(v)?),
                None => None,
            };
            out.push(FormField {
                reference: field_ref,
                name,
                field_type,
                value,
                value_ref,
            });
            return Ok(());
        }

        for kid in child_fields {
            self.collect_fields(kid, &name, field_type.as_deref(), depth + 1, visited, out)?;
        }
        Ok(())
    }
}

/// Parse the `%PDF-M.m` header.
///
/// The header may be preceded by up to 1024 bytes of junk, which some
/// producers emit.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
        })?;

    let version = &data[pos + 5..data.len().min(pos + 8)];
    match version {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok((major - b'0', minor - b'0'))
        },
        _ => Err(Error::InvalidHeader(String::from_utf8_lossy(version).into_owned())),
    }
}
