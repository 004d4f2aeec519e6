//! FlateDecode (zlib/deflate) implementation.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Tries zlib first, then raw deflate for streams whose zlib header is damaged.
/// Partial output is kept when the tail of the stream is corrupt.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
                return Ok(output);
            },
            Err(e) => e,
        };

        log::debug!("zlib decode failed ({}), trying raw deflate", zlib_err);
        output.clear();
        match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) if !output.is_empty() => Ok(output),
            Err(_) if !output.is_empty() => Ok(output),
            _ => Err(Error::Decode(format!("FlateDecode failed: {}", zlib_err))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_flate_decode_simple() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"1 0 2 15 << /Type /Catalog >>").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = FlateDecoder.decode(&compressed).unwrap();
        assert_eq!(decoded, b"1 0 2 15 << /Type /Catalog >>");
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate data").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), b"raw deflate data");
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        assert!(FlateDecoder.decode(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
