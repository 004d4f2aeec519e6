//! Timestamp data types.

use crate::asn1::oid;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use sha2::Digest;

/// Digest algorithm of a message imprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum HashAlgorithm {
    /// SHA-1 (only accepted when reading legacy tokens and certificates)
    #[serde(rename = "SHA-1")]
    Sha1,
    /// SHA-256 (default)
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    /// SHA-384
    #[serde(rename = "SHA-384")]
    Sha384,
    /// SHA-512
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha1 => oid::SHA1,
            HashAlgorithm::Sha256 => oid::SHA256,
            HashAlgorithm::Sha384 => oid::SHA384,
            HashAlgorithm::Sha512 => oid::SHA512,
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        match *oid {
            oid::SHA1 => Some(HashAlgorithm::Sha1),
            oid::SHA256 => Some(HashAlgorithm::Sha256),
            oid::SHA384 => Some(HashAlgorithm::Sha384),
            oid::SHA512 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Parse a name such as `SHA-256`, `sha256` or `SHA384`.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(Error::Unsupported(format!("hash algorithm '{}'", name))),
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hash `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of `parts` without copying them together.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            HashAlgorithm::Sha1 => run::<sha1::Sha1>(parts),
            HashAlgorithm::Sha256 => run::<sha2::Sha256>(parts),
            HashAlgorithm::Sha384 => run::<sha2::Sha384>(parts),
            HashAlgorithm::Sha512 => run::<sha2::Sha512>(parts),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// TSA-reported accuracy of `genTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TimestampAccuracy {
    /// Whole seconds
    pub seconds: u32,
    /// Milliseconds
    pub millis: u16,
    /// Microseconds
    pub micros: u16,
}

/// Fields of a TSTInfo that callers care about.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TimestampInfo {
    /// Time the TSA asserted
    pub gen_time: DateTime<Utc>,
    /// TSA policy OID, dotted form
    pub policy: String,
    /// Message imprint algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Message imprint, lowercase hex
    pub message_digest: String,
    /// Serial number, decimal
    pub serial_number: String,
    /// Whether the token carries the TSA certificate
    pub has_certificate: bool,
    /// Nonce echoed by the TSA, big-endian
    pub nonce: Option<Vec<u8>>,
    /// TSA name, when given
    pub tsa_name: Option<String>,
    /// Accuracy, when given
    pub accuracy: Option<TimestampAccuracy>,
    /// Whether the TSA claims ordering
    pub ordering: bool,
}

impl TimestampInfo {
    /// Message imprint as bytes.
    pub fn message_digest_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.message_digest)
            .map_err(|e| Error::InvalidResponse(format!("message digest is not hex: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for alg in [HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512] {
            assert_eq!(HashAlgorithm::from_name(alg.name()).unwrap(), alg);
            assert_eq!(HashAlgorithm::from_oid(&alg.oid()), Some(alg));
        }
        assert_eq!("sha384".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha384);
        assert!(HashAlgorithm::from_name("MD5").is_err());
    }

    #[test]
    fn test_digest_lengths() {
        for alg in [HashAlgorithm::Sha1, HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512] {
            assert_eq!(alg.digest(b"abc").len(), alg.output_len());
        }
        assert_eq!(
            hex::encode(HashAlgorithm::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_parts_matches_concatenation() {
        let alg = HashAlgorithm::Sha384;
        assert_eq!(alg.digest_parts(&[b"hello ", b"world"]), alg.digest(b"hello world"));
    }

    #[test]
    fn test_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&HashAlgorithm::Sha512).unwrap(), "\"SHA-512\"");
        let alg: HashAlgorithm = serde_json::from_str("\"SHA-384\"").unwrap();
        assert_eq!(alg, HashAlgorithm::Sha384);
    }
}
