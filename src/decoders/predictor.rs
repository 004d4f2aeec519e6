//! PNG predictors (10-15) for FlateDecode streams.
//!
//! Cross-reference streams almost always use `/Predictor 12` (Up) with
//! `/Columns` equal to the entry width.

use crate::error::{Error, Result};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data per row (without the PNG tag byte).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor encoding of `data`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        10..=15 => decode_png(data, params),
        other => Err(Error::Unsupported(format!("predictor {}", other))),
    }
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let width = params.pixel_bytes_per_row();
    let row_len = width + 1;
    if data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "predictor data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let bpp = params.bytes_per_pixel();
    let mut output: Vec<u8> = Vec::with_capacity(data.len() / row_len * width);
    let mut prev = vec![0u8; width];

    for row in data.chunks(row_len) {
        let tag = row[0];
        let mut cur = vec![0u8; width];
        for i in 0..width {
            let raw = row[i + 1];
            let left = if i >= bpp { cur[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            cur[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, up, up_left)),
                other => return Err(Error::Decode(format!("invalid PNG predictor tag {}", other))),
            };
        }
        output.extend_from_slice(&cur);
        prev = cur;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_predictor() {
        let params = DecodeParams::default();
        assert_eq!(decode_predictor(b"abc", &params).unwrap(), b"abc");
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams {
            predictor: 12,
            columns: 5,
            ..Default::default()
        };
        let encoded = vec![2, 10, 20, 30, 40, 50, 2, 5, 5, 5, 5, 5];
        let result = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(result, vec![10, 20, 30, 40, 50, 15, 25, 35, 45, 55]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let params = DecodeParams {
            predictor: 11,
            columns: 3,
            ..Default::default()
        };
        let result = decode_predictor(&[1, 1, 1, 1], &params).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let params = DecodeParams {
            predictor: 12,
            columns: 4,
            ..Default::default()
        };
        assert!(decode_predictor(&[2, 1, 2], &params).is_err());
    }
}
