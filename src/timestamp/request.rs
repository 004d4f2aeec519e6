//! TimeStampReq construction.

use crate::asn1::tlv;
use crate::asn1::tsp::{MessageImprint, TimeStampReq};
use crate::error::{Error, Result};
use crate::timestamp::HashAlgorithm;
use der::asn1::{ObjectIdentifier, OctetString, Uint};
use der::{Decode, Encode};
use rand::RngCore;
use spki::AlgorithmIdentifierOwned;

/// Length of the request nonce in bytes.
pub const NONCE_LEN: usize = 8;

/// Options for [`create_timestamp_request`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// TSA policy OID to request
    pub policy: Option<String>,
    /// Ask the TSA to include its certificate
    pub cert_req: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            policy: None,
            cert_req: true,
        }
    }
}

/// An encoded request and what the response must echo.
#[derive(Debug, Clone)]
pub struct TimestampRequest {
    /// DER TimeStampReq, the HTTP body
    pub der: Vec<u8>,
    /// Nonce sent, big-endian without leading zeros
    pub nonce: Vec<u8>,
    /// Imprint algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Imprint
    pub hash: Vec<u8>,
}

/// Build a TimeStampReq for `hash`.
///
/// The nonce is 8 bytes from the OS RNG; `certReq` follows `options`.
pub fn create_timestamp_request(
    hash: &[u8],
    algorithm: HashAlgorithm,
    options: &RequestOptions,
) -> Result<TimestampRequest> {
    if hash.len() != algorithm.output_len() {
        return Err(Error::HashMismatch(format!(
            "{} digest must be {} bytes, got {}",
            algorithm,
            algorithm.output_len(),
            hash.len()
        )));
    }

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    // Positive and full width
    nonce[0] = (nonce[0] & 0x7F) | 0x01;

    let req_policy = options
        .policy
        .as_deref()
        .map(|p| {
            ObjectIdentifier::new(p).map_err(|e| Error::Config(format!("invalid policy OID '{}': {}", p, e)))
        })
        .transpose()?;

    let request = TimeStampReq {
        version: 1,
        message_imprint: MessageImprint {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: algorithm.oid(),
                parameters: None,
            },
            hashed_message: OctetString::new(hash)?,
        },
        req_policy,
        nonce: Some(Uint::new(&nonce)?),
        cert_req: options.cert_req,
        extensions: None,
    };

    let der = request.to_der()?;
    log::debug!("Built {} byte TimeStampReq ({}, nonce {})", der.len(), algorithm, hex::encode(nonce));

    Ok(TimestampRequest {
        der,
        nonce: tlv::strip_leading_zeros(&nonce).to_vec(),
        hash_algorithm: algorithm,
        hash: hash.to_vec(),
    })
}

/// Decode a TimeStampReq (for diagnostics and tests).
pub fn parse_timestamp_request(der: &[u8]) -> Result<TimeStampReq> {
    TimeStampReq::from_der(der).map_err(|e| Error::InvalidResponse(format!("malformed TimeStampReq: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_fields() {
        let hash = HashAlgorithm::Sha256.digest(b"document");
        let req = create_timestamp_request(&hash, HashAlgorithm::Sha256, &RequestOptions::default()).unwrap();
        let parsed = parse_timestamp_request(&req.der).unwrap();

        assert_eq!(parsed.version, 1);
        assert!(parsed.cert_req);
        assert_eq!(parsed.message_imprint.hash_algorithm.oid, HashAlgorithm::Sha256.oid());
        assert_eq!(parsed.message_imprint.hashed_message.as_bytes(), hash.as_slice());
        assert_eq!(parsed.nonce.unwrap().as_bytes(), req.nonce.as_slice());
        assert_eq!(req.nonce.len(), NONCE_LEN);
    }

    #[test]
    fn test_nonces_differ() {
        let hash = [0u8; 32];
        let a = create_timestamp_request(&hash, HashAlgorithm::Sha256, &RequestOptions::default()).unwrap();
        let b = create_timestamp_request(&hash, HashAlgorithm::Sha256, &RequestOptions::default()).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_policy_oid() {
        let options = RequestOptions {
            policy: Some("1.2.3.4.1".to_string()),
            cert_req: false,
        };
        let req = create_timestamp_request(&[1u8; 48], HashAlgorithm::Sha384, &options).unwrap();
        let parsed = parse_timestamp_request(&req.der).unwrap();
        assert_eq!(parsed.req_policy.unwrap().to_string(), "1.2.3.4.1");
        assert!(!parsed.cert_req);

        let bad = RequestOptions {
            policy: Some("not-an-oid".to_string()),
            cert_req: true,
        };
        assert!(create_timestamp_request(&[1u8; 48], HashAlgorithm::Sha384, &bad).is_err());
    }

    #[test]
    fn test_wrong_hash_length() {
        let err = create_timestamp_request(&[0u8; 20], HashAlgorithm::Sha256, &RequestOptions::default()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::HashMismatch);
    }
}
