//! Stream decoders needed to read cross-reference and object streams.
//!
//! Only FlateDecode (with PNG/TIFF predictors) is supported: it is the only
//! filter used for `/Type /XRef` and `/Type /ObjStm` streams in practice.
//! Streams written by this crate (DSS entries, timestamp tokens) carry no filter.

use crate::error::{Error, Result};
use crate::object::Object;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Maximum decompressed size accepted for a single stream.
const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data using a filter pipeline with optional decode parameters.
///
/// Predictors from `params` are applied after all filters.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            other => return Err(Error::Unsupported(format!("stream filter /{}", other))),
        };
        current = decoder.decode(&current)?;
        log::debug!("{} produced {} bytes", decoder.name(), current.len());

        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

impl DecodeParams {
    /// Read `/DecodeParms` (a dictionary, or the first dictionary of an array).
    pub fn from_object(obj: &Object) -> Option<Self> {
        let dict = match obj {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.first()?.as_dict()?,
            _ => return None,
        };
        let int = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);

        Some(DecodeParams {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).max(1) as usize,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_stream_no_filters() {
        let out = decode_stream_with_params(b"plain", &[], None).unwrap();
        assert_eq!(out, b"plain");
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let err = decode_stream_with_params(b"x", &["DCTDecode".to_string()], None).unwrap_err();
        assert!(err.to_string().contains("DCTDecode"));
    }

    #[test]
    fn test_flate_with_png_up_predictor() {
        let raw = vec![2u8, 1, 0, 10, 2, 0, 0, 5];
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&raw).unwrap();
        let compressed = enc.finish().unwrap();

        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            colors: 1,
            bits_per_component: 8,
        };
        let out =
            decode_stream_with_params(&compressed, &["FlateDecode".to_string()], Some(&params))
                .unwrap();
        assert_eq!(out, vec![1, 0, 10, 1, 0, 15]);
    }
}
