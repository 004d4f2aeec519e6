//! Document Security Store and VRI dictionaries.
//!
//! Certificates, CRLs and OCSP responses are written as unfiltered indirect
//! streams and referenced from the `/DSS` arrays `/Certs`, `/CRLs` and
//! `/OCSPs`. Blobs already in the store (by SHA-256 of their data) are reused.
//! Everything is appended as an incremental update, so existing signatures
//! keep their `/ByteRange`.

use crate::config::VriKeyHash;
use crate::document::PdfDocument;
use crate::editor::IncrementalUpdate;
use crate::error::{Error, Result};
use crate::ltv::data::LtvData;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use crate::xref_reconstruction::scan_max_object_number;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Cert,
    Crl,
    Ocsp,
}

impl Kind {
    const ALL: [Kind; 3] = [Kind::Cert, Kind::Crl, Kind::Ocsp];

    fn dss_key(self) -> &'static str {
        match self {
            Kind::Cert => "Certs",
            Kind::Crl => "CRLs",
            Kind::Ocsp => "OCSPs",
        }
    }

    fn vri_key(self) -> &'static str {
        match self {
            Kind::Cert => "Cert",
            Kind::Crl => "CRL",
            Kind::Ocsp => "OCSP",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct Slot {
    entries: Vec<Object>,
    known: HashMap<[u8; 32], ObjectRef>,
}

/// One incremental update that adds to the DSS.
struct DssWriter {
    doc: PdfDocument,
    update: IncrementalUpdate,
    catalog: Dictionary,
    dss_ref: Option<ObjectRef>,
    dss: Dictionary,
    slots: [Slot; 3],
    added: usize,
}

impl DssWriter {
    fn open(pdf: &[u8]) -> Result<Self> {
        let mut doc = PdfDocument::load(pdf)?;
        let mut update = IncrementalUpdate::snapshot(&doc)?;
        let scanned_next = scan_max_object_number(pdf).saturating_add(1);
        update.set_next_object_number(update.next_object_number().max(scanned_next));

        let catalog = doc.catalog()?;
        let (dss_ref, dss) = match catalog.get("DSS") {
            Some(Object::Reference(r)) => match doc.load_object(*r)? {
                Object::Dictionary(d) => (Some(*r), d),
                other => return Err(Error::InvalidPdf(format!("/DSS is a {}", other.type_name()))),
            },
            Some(Object::Dictionary(d)) => (None, d.clone()),
            _ => (None, Dictionary::new()),
        };

        let mut slots: [Slot; 3] = Default::default();
        for kind in Kind::ALL {
            let slot = &mut slots[kind.index()];
            let Some(value) = dss.get(kind.dss_key()) else {
                continue;
            };
            if let Object::Array(entries) = doc.resolve(value)? {
                for entry in &entries {
                    if let Some(r) = entry.as_reference() {
                        match doc.load_object(r).and_then(|o| o.decode_stream_data()) {
                            Ok(data) => {
                                slot.known.insert(Sha256::digest(&data).into(), r);
                            },
                            Err(e) => log::debug!("Unreadable DSS /{} entry {}: {}", kind.dss_key(), r, e),
                        }
                    }
                }
                slot.entries = entries;
            }
        }

        Ok(Self {
            doc,
            update,
            catalog,
            dss_ref,
            dss,
            slots,
            added: 0,
        })
    }

    /// Reference of the stream holding `der`, adding it when new.
    fn add(&mut self, kind: Kind, der: &[u8]) -> Result<ObjectRef> {
        let key: [u8; 32] = Sha256::digest(der).into();
        if let Some(r) = self.slots[kind.index()].known.get(&key) {
            return Ok(*r);
        }
        let r = self.update.register(ObjectSerializer::raw_stream(der.to_vec()))?;
        let slot = &mut self.slots[kind.index()];
        slot.known.insert(key, r);
        slot.entries.push(Object::Reference(r));
        self.added += 1;
        Ok(r)
    }

    fn add_all(&mut self, ltv: &LtvData) -> Result<[Vec<ObjectRef>; 3]> {
        let mut refs: [Vec<ObjectRef>; 3] = Default::default();
        for der in ltv.certificates.iter() {
            refs[Kind::Cert.index()].push(self.add(Kind::Cert, der)?);
        }
        for der in ltv.crls.iter() {
            refs[Kind::Crl.index()].push(self.add(Kind::Crl, der)?);
        }
        for der in ltv.ocsp_responses.iter() {
            refs[Kind::Ocsp.index()].push(self.add(Kind::Ocsp, der)?);
        }
        Ok(refs)
    }

    /// The existing VRI dictionary (from the DSS or the catalog) and its reference.
    fn vri(&mut self) -> Result<(Option<ObjectRef>, Dictionary)> {
        let value = self.dss.get("VRI").or_else(|| self.catalog.get("VRI")).cloned();
        match value {
            Some(Object::Reference(r)) => match self.doc.load_object(r)? {
                Object::Dictionary(d) => Ok((Some(r), d)),
                other => Err(Error::InvalidPdf(format!("/VRI is a {}", other.type_name()))),
            },
            Some(Object::Dictionary(d)) => Ok((None, d)),
            _ => Ok((None, Dictionary::new())),
        }
    }

    fn finish(mut self, pdf: &[u8]) -> Result<Vec<u8>> {
        for kind in Kind::ALL {
            let slot = std::mem::take(&mut self.slots[kind.index()]);
            if slot.entries.is_empty() {
                self.dss.remove(kind.dss_key());
            } else {
                self.dss.insert(kind.dss_key().to_string(), Object::Array(slot.entries));
            }
        }
        self.dss.insert("Type".to_string(), ObjectSerializer::name("DSS"));

        let dss_ref = match self.dss_ref {
            Some(r) => r,
            None => self.update.reserve()?,
        };
        self.update.put(dss_ref, Object::Dictionary(self.dss));
        self.catalog.insert("DSS".to_string(), Object::Reference(dss_ref));
        let root = self.update.root();
        self.update.put(root, Object::Dictionary(self.catalog));

        let written = self.update.write(pdf)?;
        log::debug!(
            "DSS update adds {} stream(s); {} -> {} bytes",
            self.added,
            pdf.len(),
            written.bytes.len()
        );
        Ok(written.bytes)
    }
}

/// Append a DSS holding `ltv` (merged with any existing DSS) to `pdf`.
pub fn add_dss(pdf: &[u8], ltv: &LtvData) -> Result<Vec<u8>> {
    let mut writer = DssWriter::open(pdf)?;
    writer.add_all(ltv)?;
    writer.finish(pdf)
}

/// VRI key for a certificate: uppercase hex digest of its DER.
pub fn vri_key(cert_der: &[u8], hash: VriKeyHash) -> String {
    hex::encode_upper(hash.algorithm().digest(cert_der))
}

/// Append DSS data plus a VRI entry for `signer_cert`.
///
/// The entry lists `/Cert`, `/CRL` and `/OCSP` references to the DSS streams
/// of `ltv` (existing streams are reused) and, when `timestamp` is given,
/// `/TS` referencing a stream with that token. The VRI dictionary is linked
/// from both the DSS and the catalog.
pub fn add_vri_enhanced(
    pdf: &[u8],
    signer_cert: &[u8],
    ltv: &LtvData,
    hash: VriKeyHash,
    timestamp: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut writer = DssWriter::open(pdf)?;
    let signer_ref = writer.add(Kind::Cert, signer_cert)?;
    let mut refs = writer.add_all(ltv)?;
    if !refs[Kind::Cert.index()].contains(&signer_ref) {
        refs[Kind::Cert.index()].insert(0, signer_ref);
    }
    let (vri_ref, mut vri) = writer.vri()?;

    let key = vri_key(signer_cert, hash);
    let mut entry = match vri.get(&key) {
        Some(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };
    for kind in Kind::ALL {
        let list = &refs[kind.index()];
        if list.is_empty() {
            continue;
        }
        let mut values: Vec<Object> = entry
            .get(kind.vri_key())
            .and_then(|o| o.as_array())
            .cloned()
            .unwrap_or_default();
        for r in list {
            let value = Object::Reference(*r);
            if !values.contains(&value) {
                values.push(value);
            }
        }
        entry.insert(kind.vri_key().to_string(), Object::Array(values));
    }
    if let Some(token) = timestamp {
        let ts_ref = writer.update.register(ObjectSerializer::raw_stream(token.to_vec()))?;
        entry.insert("TS".to_string(), Object::Reference(ts_ref));
    }
    log::debug!("VRI entry {} with {} key(s)", key, entry.len());
    vri.insert(key, Object::Dictionary(entry));

    let vri_ref = match vri_ref {
        Some(r) => r,
        None => writer.update.reserve()?,
    };
    writer.update.put(vri_ref, Object::Dictionary(vri));
    writer.dss.insert("VRI".to_string(), Object::Reference(vri_ref));
    writer.catalog.insert("VRI".to_string(), Object::Reference(vri_ref));
    writer.finish(pdf)
}

/// Certificates, CRLs and OCSP responses stored in the document's DSS.
pub fn read_dss(pdf: &[u8]) -> Result<LtvData> {
    let mut doc = PdfDocument::load(pdf)?;
    let catalog = doc.catalog()?;
    let mut out = LtvData::new();
    let Some(dss) = doc.resolve_dict(&catalog, "DSS")? else {
        return Ok(out);
    };
    for kind in Kind::ALL {
        let Some(value) = dss.get(kind.dss_key()) else {
            continue;
        };
        let Object::Array(entries) = doc.resolve(value)? else {
            continue;
        };
        for entry in entries {
            let data = match doc.resolve(&entry).and_then(|o| o.decode_stream_data()) {
                Ok(data) => data,
                Err(e) => {
                    log::debug!("Skipping unreadable DSS /{} entry: {}", kind.dss_key(), e);
                    continue;
                },
            };
            match kind {
                Kind::Cert => out.add_certificate(data),
                Kind::Crl => out.add_crl(data),
                Kind::Ocsp => out.add_ocsp_response(data),
            };
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vri_key_is_uppercase_hex() {
        let sha1 = vri_key(b"abc", VriKeyHash::Sha1);
        assert_eq!(sha1, "A9993E364706816ABA3E25717850C26C9CD0D89D");
        assert_eq!(vri_key(b"abc", VriKeyHash::Sha256).len(), 64);
    }
}
