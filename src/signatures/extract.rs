//! Enumerating document timestamps.

use crate::asn1::tlv;
use crate::asn1::TimestampToken;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::signatures::byterange::ByteRange;
use crate::signatures::types::{ExtractedTimestamp, SignatureSubFilter};

/// A signature dictionary found through the AcroForm, any sub-filter.
#[derive(Debug, Clone)]
pub struct SignatureField {
    /// Fully qualified field name
    pub name: String,
    /// `/SubFilter`, if recognised
    pub sub_filter: Option<SignatureSubFilter>,
    /// `/ByteRange`, if it holds real offsets
    pub byte_range: Option<ByteRange>,
    /// `/Contents` bytes with trailing padding removed
    pub contents: Vec<u8>,
    /// The signature dictionary
    pub dictionary: Dictionary,
}

/// List every signed signature field of `doc`.
///
/// Fields without a `/V` dictionary (unsigned) are skipped.
pub fn signature_fields(doc: &mut PdfDocument) -> Result<Vec<SignatureField>> {
    let mut out = Vec::new();
    for field in doc.acroform_fields()? {
        if !field.is_signature() {
            continue;
        }
        let dictionary = match field.value {
            Some(Object::Dictionary(d)) => d,
            _ => {
                log::debug!("Signature field '{}' is unsigned", field.name);
                continue;
            },
        };
        let sub_filter = dictionary
            .get("SubFilter")
            .and_then(|o| o.as_name())
            .and_then(SignatureSubFilter::from_pdf_name);
        let byte_range = match dictionary.get("ByteRange") {
            Some(obj) => match ByteRange::from_object(obj) {
                Ok(range) => Some(range),
                Err(e) => {
                    log::debug!("Signature field '{}' has no usable /ByteRange: {}", field.name, e);
                    None
                },
            },
            None => None,
        };
        let contents = dictionary
            .get("Contents")
            .and_then(|o| o.as_string())
            .map(trim_contents)
            .unwrap_or_default();
        out.push(SignatureField {
            name: field.name,
            sub_filter,
            byte_range,
            contents,
            dictionary,
        });
    }
    Ok(out)
}

/// Cut `/Contents` down to the DER length of its first element.
///
/// Bytes that do not start with a parsable TLV are returned as-is.
fn trim_contents(contents: &[u8]) -> Vec<u8> {
    match tlv::encoded_len(contents) {
        Ok(len) => contents[..len].to_vec(),
        Err(_) => contents.to_vec(),
    }
}

/// All `/SubFilter /ETSI.RFC3161` timestamps in `pdf`, in field order.
///
/// Placeholders that were never filled (all-zero `/Contents` or a sentinel
/// `/ByteRange`) are skipped. A field whose token cannot be parsed fails the
/// whole call.
pub fn extract_timestamps(pdf: &[u8]) -> Result<Vec<ExtractedTimestamp>> {
    let mut doc = PdfDocument::load(pdf)?;
    let mut out = Vec::new();

    for field in signature_fields(&mut doc)? {
        if field.sub_filter != Some(SignatureSubFilter::Rfc3161) {
            continue;
        }
        let byte_range = match field.byte_range {
            Some(range) => range,
            None => {
                log::debug!("Skipping timestamp field '{}' without a final /ByteRange", field.name);
                continue;
            },
        };
        if field.contents.iter().all(|&b| b == 0) {
            log::debug!("Skipping empty timestamp placeholder '{}'", field.name);
            continue;
        }

        let token = TimestampToken::from_der(&field.contents).map_err(|e| {
            Error::InvalidResponse(format!("timestamp field '{}' holds an unreadable token: {}", field.name, e))
        })?;
        let info = token.info()?;

        let text = |key: &str| field.dictionary.get(key).and_then(|o| o.as_text());
        out.push(ExtractedTimestamp {
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            modification_time: text("M"),
            field_name: field.name,
            info,
            token: token.der().to_vec(),
            covers_whole_document: byte_range.covers_to_end(pdf.len()),
            byte_range,
            verified: None,
            verification_error: None,
        });
    }

    log::debug!("Found {} document timestamp(s)", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_contents() {
        assert_eq!(trim_contents(&[0x30, 0x02, 0x05, 0x00, 0x00, 0x00]), vec![0x30, 0x02, 0x05, 0x00]);
        assert_eq!(trim_contents(&[0x00, 0x00]), vec![0x00, 0x00]);

        let hostile = [0x30u8, 0x80].repeat(8000);
        assert_eq!(trim_contents(&hostile), hostile);
    }
}
