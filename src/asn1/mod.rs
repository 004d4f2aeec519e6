//! ASN.1 codec layer.
//!
//! Typed structures are built on the RustCrypto `der` derive macros, with
//! `x509-cert`/`cms` for certificates and SignedData and `x509-parser` for
//! certificate and CRL inspection. The [`tlv`] reader covers positional
//! access where exact encodings matter or a schema decoder is too strict.

pub mod cms;
pub mod crl;
pub mod ocsp;
pub mod oid;
pub mod signature;
pub mod time;
pub mod tlv;
pub mod tsp;
pub mod x509;

pub use self::cms::TimestampToken;
pub use self::crl::CrlInfo;
pub use self::x509::CertificateInfo;

/// Decimal rendering of an unsigned big-endian integer of any length.
pub fn uint_to_decimal(bytes: &[u8]) -> String {
    let mut digits = tlv::strip_leading_zeros(bytes).to_vec();
    if digits.is_empty() {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while !digits.is_empty() {
        // Long division by 10
        let mut remainder = 0u32;
        let mut quotient = Vec::with_capacity(digits.len());
        for &byte in &digits {
            let acc = (remainder << 8) | byte as u32;
            let q = acc / 10;
            remainder = acc % 10;
            if !quotient.is_empty() || q != 0 {
                quotient.push(q as u8);
            }
        }
        out.push(b'0' + remainder as u8);
        digits = quotient;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_to_decimal() {
        assert_eq!(uint_to_decimal(&[]), "0");
        assert_eq!(uint_to_decimal(&[0x00]), "0");
        assert_eq!(uint_to_decimal(&[0x01, 0x00]), "256");
        assert_eq!(uint_to_decimal(&[0x00, 0xFF]), "255");
        assert_eq!(
            uint_to_decimal(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            u64::MAX.to_string()
        );
        // 2^64
        assert_eq!(uint_to_decimal(&[1, 0, 0, 0, 0, 0, 0, 0, 0]), "18446744073709551616");
    }
}
