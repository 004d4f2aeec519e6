//! Writing a token into a prepared placeholder.

use crate::error::{Error, Result};
use crate::signatures::types::PreparedPdf;

/// Patch `token` into the `/Contents` placeholder of `prepared`.
///
/// The token is written as uppercase hex and right-padded with `0` to the
/// placeholder length, so the output has exactly the length of
/// `prepared.bytes` and every offset (including the `/ByteRange` values)
/// stays valid. Embedding the same token twice yields identical bytes.
pub fn embed_timestamp_token(prepared: &PreparedPdf, token: &[u8]) -> Result<Vec<u8>> {
    if token.is_empty() {
        return Err(Error::InvalidResponse("timestamp token is empty".to_string()));
    }

    let hex = hex::encode_upper(token);
    if hex.len() > prepared.placeholder_length {
        return Err(Error::InvalidPdf(format!(
            "timestamp token is {} bytes but the placeholder holds {} bytes; increase signatureSize to ≥ {} bytes",
            token.len(),
            prepared.capacity(),
            token.len()
        )));
    }

    let start = prepared.contents_offset;
    let end = start.saturating_add(prepared.placeholder_length);
    let opened = start.checked_sub(1).and_then(|i| prepared.bytes.get(i)) == Some(&b'<');
    if !opened || prepared.bytes.get(end) != Some(&b'>') {
        return Err(Error::InvalidPdf(format!(
            "no /Contents placeholder at offset {} (length {})",
            start, prepared.placeholder_length
        )));
    }

    let mut bytes = prepared.bytes.clone();
    let slot = &mut bytes[start..end];
    slot.fill(b'0');
    slot[..hex.len()].copy_from_slice(hex.as_bytes());

    log::debug!(
        "Embedded {} byte token ({} of {} placeholder bytes used)",
        token.len(),
        token.len(),
        prepared.capacity()
    );
    Ok(bytes)
}
