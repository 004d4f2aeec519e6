//! Token and document verification.

use crate::asn1::TimestampToken;
use crate::error::Result;
use crate::signatures::extract::extract_timestamps;
use crate::signatures::types::{ExtractedTimestamp, TimestampVerification};

/// Verify one extracted timestamp, recording the outcome on it.
///
/// The token's CMS signature is always checked against its embedded TSA
/// certificate. When `pdf` is given, the digest of its `/ByteRange` spans
/// must also equal the token's message imprint; otherwise the result is
/// `"Document hash mismatch"`.
pub fn verify_timestamp(extracted: &mut ExtractedTimestamp, pdf: Option<&[u8]>) -> TimestampVerification {
    let outcome = check(extracted, pdf);
    extracted.verified = Some(outcome.verified);
    extracted.verification_error = outcome.error.clone();
    if let Some(error) = &outcome.error {
        log::warn!("Timestamp '{}' failed verification: {}", extracted.field_name, error);
    } else {
        log::debug!(
            "Timestamp '{}' verified{}",
            extracted.field_name,
            if outcome.document_checked { " against the document" } else { "" }
        );
    }
    outcome
}

fn check(extracted: &ExtractedTimestamp, pdf: Option<&[u8]>) -> TimestampVerification {
    let document_checked = pdf.is_some();

    let token = match TimestampToken::from_der(&extracted.token) {
        Ok(token) => token,
        Err(e) => return TimestampVerification::failed(format!("Invalid token: {}", e), document_checked),
    };
    if let Err(e) = token.verify_signature() {
        return TimestampVerification::failed(format!("Token signature invalid: {}", e), document_checked);
    }

    if let Some(pdf) = pdf {
        let algorithm = extracted.info.hash_algorithm;
        let actual = match extracted.byte_range.digest(pdf, algorithm) {
            Ok(digest) => digest,
            Err(e) => return TimestampVerification::failed(format!("Document hash mismatch: {}", e), true),
        };
        let expected = match extracted.info.message_digest_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return TimestampVerification::failed(e.to_string(), true),
        };
        if actual != expected {
            return TimestampVerification::failed(
                format!(
                    "Document hash mismatch: expected {}, computed {}",
                    extracted.info.message_digest,
                    hex::encode(&actual)
                ),
                true,
            );
        }
    }

    TimestampVerification::ok(document_checked)
}

/// Extract every timestamp of `pdf` and verify each against the document.
pub fn verify_timestamps(pdf: &[u8]) -> Result<Vec<ExtractedTimestamp>> {
    let mut timestamps = extract_timestamps(pdf)?;
    for ts in &mut timestamps {
        verify_timestamp(ts, Some(pdf));
    }
    Ok(timestamps)
}
