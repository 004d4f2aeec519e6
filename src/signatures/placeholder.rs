//! Timestamp placeholder insertion.
//!
//! Appends, as one incremental update, a `/Sig` dictionary of subtype
//! `ETSI.RFC3161` with a zeroed `/Contents` string, an invisible widget field
//! pointing at it, and the page `/Annots` and AcroForm `/Fields` entries that
//! make the field reachable. Existing signatures are untouched: their bytes
//! stay where they are and keep their `/ByteRange`.

use crate::document::PdfDocument;
use crate::editor::IncrementalUpdate;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::signatures::byterange::{self, ByteRange};
use crate::signatures::types::{PrepareOptions, PreparedPdf, SignatureSubFilter};
use crate::writer::ObjectSerializer;
use crate::xref_reconstruction::scan_max_object_number;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// `/F` of the widget: Print | Locked.
const WIDGET_FLAGS: i64 = 132;

/// `/SigFlags`: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// Format a PDF date string (`D:YYYYMMDDHHmmSS+00'00'`).
pub fn format_pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Insert a timestamp placeholder into `pdf`.
///
/// # Errors
///
/// - a PDF error if the document cannot be parsed or is encrypted
/// - [`Error::ObjectCollision`] if a new object number would shadow an existing one
pub fn prepare_pdf_for_timestamp(pdf: &[u8], options: &PrepareOptions) -> Result<PreparedPdf> {
    if options.signature_size == 0 {
        return Err(Error::Config("signature size must be positive".to_string()));
    }

    let mut doc = PdfDocument::load(pdf)?;
    let fields = doc.acroform_fields()?;
    let existing_signatures = fields.iter().filter(|f| f.is_signature()).count();
    log::debug!("Preparing timestamp placeholder; document has {} signature field(s)", existing_signatures);

    let field_name = match &options.field_name {
        Some(name) => {
            if fields.iter().any(|f| &f.name == name) {
                return Err(Error::InvalidPdf(format!("a field named '{}' already exists", name)));
            }
            name.clone()
        },
        None => {
            let taken: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            (existing_signatures + 1..)
                .map(|n| format!("Timestamp{}", n))
                .find(|candidate| !taken.contains(candidate.as_str()))
                .unwrap_or_else(|| "Timestamp".to_string())
        },
    };

    let mut update = IncrementalUpdate::snapshot(&doc)?;
    // The library's own counter can undercount after earlier updates; force it
    // past every `N G obj` header in the raw bytes.
    let scanned_next = scan_max_object_number(pdf).saturating_add(1);
    update.set_next_object_number(update.next_object_number().max(scanned_next));

    let signature_ref = update.register(signature_dictionary(options, Utc::now()))?;

    let page = doc.first_page()?;
    let mut widget = Dictionary::new();
    widget.insert("Type".to_string(), ObjectSerializer::name("Annot"));
    widget.insert("Subtype".to_string(), ObjectSerializer::name("Widget"));
    widget.insert("FT".to_string(), ObjectSerializer::name("Sig"));
    widget.insert("T".to_string(), Object::String(field_name.as_bytes().to_vec()));
    widget.insert("V".to_string(), Object::Reference(signature_ref));
    widget.insert(
        "Rect".to_string(),
        Object::Array(vec![Object::Integer(0); 4]),
    );
    widget.insert("F".to_string(), Object::Integer(WIDGET_FLAGS));
    if let Some((page_ref, _)) = &page {
        widget.insert("P".to_string(), Object::Reference(*page_ref));
    }
    let widget_ref = update.register(Object::Dictionary(widget))?;

    if let Some((page_ref, page_dict)) = page {
        add_to_annots(&mut doc, &mut update, page_ref, page_dict, widget_ref)?;
    } else {
        log::warn!("Document has no pages; timestamp field is not attached to a page");
    }
    add_to_acroform(&mut doc, &mut update, widget_ref)?;

    let written = update.write(pdf)?;
    let mut bytes = written.bytes;
    let sig_offset = written
        .offsets
        .get(&signature_ref.id)
        .copied()
        .ok_or_else(|| Error::InvalidPdf("signature dictionary was not written".to_string()))?;

    let placeholder_pos = byterange::find_byte_range_placeholder(&bytes, sig_offset)
        .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder not found in signature dictionary".to_string()))?;
    let (lt, gt) = byterange::find_contents(&bytes, sig_offset)
        .ok_or_else(|| Error::InvalidPdf("/Contents placeholder not found in signature dictionary".to_string()))?;
    let byte_range = ByteRange::around_contents(bytes.len(), lt, gt);
    byterange::patch_byte_range(&mut bytes, placeholder_pos, &byte_range)?;

    let placeholder_length = gt - lt - 1;
    if placeholder_length != options.signature_size * 2 {
        return Err(Error::InvalidPdf(format!(
            "/Contents placeholder is {} hex digits, expected {}",
            placeholder_length,
            options.signature_size * 2
        )));
    }

    log::info!(
        "Inserted timestamp placeholder '{}' as {} (ByteRange {})",
        field_name,
        signature_ref,
        byte_range.to_pdf_string()
    );

    Ok(PreparedPdf {
        bytes,
        byte_range,
        contents_offset: lt + 1,
        placeholder_length,
        signature_ref,
        field_name,
    })
}

fn signature_dictionary(options: &PrepareOptions, now: DateTime<Utc>) -> Object {
    let mut sig = Dictionary::new();
    sig.insert("Type".to_string(), ObjectSerializer::name("Sig"));
    sig.insert("Filter".to_string(), ObjectSerializer::name("Adobe.PPKLite"));
    sig.insert(
        "SubFilter".to_string(),
        ObjectSerializer::name(SignatureSubFilter::Rfc3161.as_pdf_name()),
    );
    sig.insert("ByteRange".to_string(), ByteRange::placeholder_object());
    sig.insert("Contents".to_string(), Object::String(vec![0u8; options.signature_size]));

    let text = |s: &String| Object::String(s.as_bytes().to_vec());
    if let Some(reason) = &options.reason {
        sig.insert("Reason".to_string(), text(reason));
    }
    if let Some(location) = &options.location {
        sig.insert("Location".to_string(), text(location));
    }
    if let Some(contact) = &options.contact_info {
        sig.insert("ContactInfo".to_string(), text(contact));
    }
    if !options.omit_modification_time {
        sig.insert("M".to_string(), Object::String(format_pdf_date(now).into_bytes()));
    }
    Object::Dictionary(sig)
}

/// Append `widget` to the page's `/Annots`, updating whichever object holds the array.
fn add_to_annots(
    doc: &mut PdfDocument,
    update: &mut IncrementalUpdate,
    page_ref: ObjectRef,
    mut page: Dictionary,
    widget: ObjectRef,
) -> Result<()> {
    match page.get("Annots").cloned() {
        Some(Object::Reference(annots_ref)) => {
            let mut annots = match doc.load_object(annots_ref)? {
                Object::Array(arr) => arr,
                other => {
                    return Err(Error::InvalidPdf(format!("page /Annots is a {}", other.type_name())));
                },
            };
            annots.push(Object::Reference(widget));
            update.put(annots_ref, Object::Array(annots));
        },
        Some(Object::Array(mut annots)) => {
            annots.push(Object::Reference(widget));
            page.insert("Annots".to_string(), Object::Array(annots));
            update.put(page_ref, Object::Dictionary(page));
        },
        _ => {
            page.insert("Annots".to_string(), Object::Array(vec![Object::Reference(widget)]));
            update.put(page_ref, Object::Dictionary(page));
        },
    }
    Ok(())
}

/// Append `field` to the AcroForm `/Fields` and set `/SigFlags`, creating the AcroForm if needed.
fn add_to_acroform(doc: &mut PdfDocument, update: &mut IncrementalUpdate, field: ObjectRef) -> Result<()> {
    let catalog_ref = update.root();
    let mut catalog = match update.get(catalog_ref) {
        Some(Object::Dictionary(d)) => d.clone(),
        _ => doc.catalog()?,
    };

    match catalog.get("AcroForm").cloned() {
        Some(Object::Reference(form_ref)) => {
            let mut form = match doc.load_object(form_ref)? {
                Object::Dictionary(d) => d,
                other => {
                    return Err(Error::InvalidPdf(format!("/AcroForm is a {}", other.type_name())));
                },
            };
            append_field(doc, update, &mut form, field)?;
            update.put(form_ref, Object::Dictionary(form));
        },
        Some(Object::Dictionary(mut form)) => {
            append_field(doc, update, &mut form, field)?;
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
            update.put(catalog_ref, Object::Dictionary(catalog));
        },
        _ => {
            let mut form = Dictionary::new();
            form.insert("Fields".to_string(), Object::Array(vec![Object::Reference(field)]));
            form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
            let form_ref = update.register(Object::Dictionary(form))?;
            catalog.insert("AcroForm".to_string(), Object::Reference(form_ref));
            update.put(catalog_ref, Object::Dictionary(catalog));
        },
    }
    Ok(())
}

fn append_field(
    doc: &mut PdfDocument,
    update: &mut IncrementalUpdate,
    form: &mut Dictionary,
    field: ObjectRef,
) -> Result<()> {
    match form.get("Fields").cloned() {
        Some(Object::Reference(fields_ref)) => {
            let mut fields = match doc.load_object(fields_ref)? {
                Object::Array(arr) => arr,
                _ => Vec::new(),
            };
            fields.push(Object::Reference(field));
            update.put(fields_ref, Object::Array(fields));
        },
        Some(Object::Array(mut fields)) => {
            fields.push(Object::Reference(field));
            form.insert("Fields".to_string(), Object::Array(fields));
        },
        _ => {
            form.insert("Fields".to_string(), Object::Array(vec![Object::Reference(field)]));
        },
    }
    let flags = form.get("SigFlags").and_then(|o| o.as_integer()).unwrap_or(0);
    form.insert("SigFlags".to_string(), Object::Integer(flags | SIG_FLAGS));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pdf_date_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_pdf_date(at), "D:20240309070501+00'00'");
    }

    #[test]
    fn test_signature_dictionary_entries() {
        let options = PrepareOptions::default()
            .with_signature_size(4)
            .with_reason("archive")
            .without_modification_time();
        let sig = signature_dictionary(&options, Utc::now());
        let dict = sig.as_dict().unwrap();
        assert_eq!(dict.get("SubFilter").and_then(|o| o.as_name()), Some("ETSI.RFC3161"));
        assert_eq!(dict.get("Contents"), Some(&Object::String(vec![0; 4])));
        assert!(dict.contains_key("Reason"));
        assert!(!dict.contains_key("M"));

        let text = ObjectSerializer::compact().serialize_to_string(&sig);
        assert!(text.contains("/Contents <00000000>"));
        assert!(text.contains(byterange::PLACEHOLDER_ARRAY));
    }
}
