//! Incremental updates.
//!
//! An incremental update appends new and changed objects, a cross-reference
//! section and a trailer after the original bytes. The original bytes are
//! never rewritten, so every byte offset in them (including the `/ByteRange`
//! of existing signatures) stays valid.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::ObjectSerializer;
use crate::xref::XRefEntry;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Result of [`IncrementalUpdate::write`].
#[derive(Debug, Clone)]
pub struct WrittenUpdate {
    /// Original bytes followed by the update
    pub bytes: Vec<u8>,
    /// Absolute offset of each written object's `N G obj` header
    pub offsets: HashMap<u32, usize>,
    /// Offset where the appended section starts
    pub update_start: usize,
}

impl WrittenUpdate {
    /// Offset of a written object.
    pub fn offset_of(&self, r: ObjectRef) -> Option<usize> {
        self.offsets.get(&r.id).copied()
    }
}

/// Snapshot of a loaded document that collects objects for one incremental save.
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    prev_startxref: Option<u64>,
    prev_size: u32,
    root: ObjectRef,
    info: Option<Object>,
    id: Option<Object>,
    /// Object numbers already defined anywhere in the document
    existing: HashSet<u32>,
    next_object_number: u32,
    /// Objects to write, keyed by object number
    objects: BTreeMap<u32, (u16, Object)>,
    /// Full entry list for documents whose own xref chain is unusable
    rebuilt_entries: Option<Vec<(u32, u64, u16)>>,
}

impl IncrementalUpdate {
    /// Capture the state needed to append to `doc`.
    ///
    /// The object-number counter starts above the largest object number found
    /// anywhere in the raw bytes.
    pub fn snapshot(doc: &PdfDocument) -> Result<Self> {
        let root = doc.catalog_ref()?;
        let trailer = doc.trailer();

        let (prev_startxref, rebuilt_entries) = if doc.is_reconstructed() {
            let entries = doc
                .xref()
                .iter()
                .filter_map(|(id, e)| match e {
                    XRefEntry::Uncompressed { offset, generation } => Some((id, *offset, *generation)),
                    _ => None,
                })
                .collect();
            (None, Some(entries))
        } else {
            (Some(doc.startxref()?), None)
        };

        let max = doc.max_object_number();
        Ok(Self {
            prev_startxref,
            prev_size: trailer.get("Size").and_then(|o| o.as_integer()).unwrap_or(0).max(0) as u32,
            root,
            info: trailer.get("Info").cloned(),
            id: trailer.get("ID").cloned(),
            existing: doc.defined_object_numbers(),
            next_object_number: max + 1,
            objects: BTreeMap::new(),
            rebuilt_entries,
        })
    }

    /// The catalog reference carried into the new trailer.
    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Next object number [`reserve`](Self::reserve) will hand out.
    pub fn next_object_number(&self) -> u32 {
        self.next_object_number
    }

    /// Force the object-number counter.
    pub fn set_next_object_number(&mut self, next: u32) {
        self.next_object_number = next.max(1);
    }

    /// Allocate a fresh object number.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectCollision`] if the counter points at a number that is
    /// already defined in the document or already used by this update.
    pub fn reserve(&mut self) -> Result<ObjectRef> {
        let id = self.next_object_number;
        if self.existing.contains(&id) || self.objects.contains_key(&id) {
            return Err(Error::ObjectCollision(id));
        }
        self.next_object_number = id
            .checked_add(1)
            .ok_or_else(|| Error::InvalidPdf("object number space exhausted".to_string()))?;
        self.objects.insert(id, (0, Object::Null));
        Ok(ObjectRef::new(id, 0))
    }

    /// Reserve a number and store `obj` under it.
    pub fn register(&mut self, obj: Object) -> Result<ObjectRef> {
        let r = self.reserve()?;
        self.put(r, obj);
        Ok(r)
    }

    /// Store a new object, or an intentional new revision of an existing one.
    pub fn put(&mut self, r: ObjectRef, obj: Object) {
        self.objects.insert(r.id, (r.gen, obj));
    }

    /// Object staged under `r`, if any.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(&r.id).map(|(_, o)| o)
    }

    /// Mutable access to a staged object.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(&r.id).map(|(_, o)| o)
    }

    /// Number of staged objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Append the staged objects to `original`.
    ///
    /// Writes one xref subsection per object, and a trailer with `/Size`,
    /// `/Prev`, `/Root`, `/Info` and `/ID`.
    pub fn write(&self, original: &[u8]) -> Result<WrittenUpdate> {
        let serializer = ObjectSerializer::compact();
        let mut out = Vec::with_capacity(original.len() + 4096 + self.objects.len() * 256);
        out.extend_from_slice(original);
        if !original.ends_with(b"\n") && !original.ends_with(b"\r") {
            out.push(b'\n');
        }
        let update_start = out.len();

        let mut offsets = HashMap::new();
        let mut xref_entries: Vec<(u32, u64, u16)> = Vec::new();
        for (&id, (gen, obj)) in &self.objects {
            offsets.insert(id, out.len());
            xref_entries.push((id, out.len() as u64, *gen));
            out.extend_from_slice(&serializer.serialize_indirect(id, *gen, obj));
        }

        if let Some(rebuilt) = &self.rebuilt_entries {
            let written: HashSet<u32> = xref_entries.iter().map(|(id, _, _)| *id).collect();
            xref_entries.extend(rebuilt.iter().filter(|(id, _, _)| !written.contains(id)));
            xref_entries.push((0, 0, 65535));
        }
        xref_entries.sort_by_key(|(id, _, _)| *id);

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n");
        for (id, offset, gen) in &xref_entries {
            let kind = if *id == 0 { 'f' } else { 'n' };
            out.extend_from_slice(format!("{} 1\n{:010} {:05} {} \n", id, offset, gen, kind).as_bytes());
        }

        let max_written = xref_entries.iter().map(|(id, _, _)| *id).max().unwrap_or(0);
        let size = (max_written + 1).max(self.prev_size).max(self.next_object_number);

        let mut trailer = crate::object::Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        if let Some(prev) = self.prev_startxref {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }
        trailer.insert("Root".to_string(), Object::Reference(self.root));
        if let Some(info) = &self.info {
            trailer.insert("Info".to_string(), info.clone());
        }
        if let Some(id) = &self.id {
            trailer.insert("ID".to_string(), id.clone());
        }

        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "incremental update: {} objects, {} bytes appended",
            self.objects.len(),
            out.len() - update_start
        );

        Ok(WrittenUpdate {
            bytes: out,
            offsets,
            update_start,
        })
    }
}
