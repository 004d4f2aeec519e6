//! Collected validation material.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// DER blobs deduplicated by SHA-256, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerSet(IndexMap<[u8; 32], Vec<u8>>);

impl DerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `der` unless an identical blob is present. Returns whether it was added.
    pub fn insert(&mut self, der: Vec<u8>) -> bool {
        let key: [u8; 32] = Sha256::digest(&der).into();
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, der);
        true
    }

    pub fn contains(&self, der: &[u8]) -> bool {
        let key: [u8; 32] = Sha256::digest(der).into();
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.0.values().map(Vec::as_slice)
    }

    /// Total size in bytes.
    pub fn byte_len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl Extend<Vec<u8>> for DerSet {
    fn extend<T: IntoIterator<Item = Vec<u8>>>(&mut self, iter: T) {
        for der in iter {
            self.insert(der);
        }
    }
}

/// Certificates, CRLs and OCSP responses for a DSS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LtvData {
    pub certificates: DerSet,
    pub crls: DerSet,
    pub ocsp_responses: DerSet,
}

impl LtvData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_certificate(&mut self, der: Vec<u8>) -> bool {
        self.certificates.insert(der)
    }

    pub fn add_crl(&mut self, der: Vec<u8>) -> bool {
        self.crls.insert(der)
    }

    pub fn add_ocsp_response(&mut self, der: Vec<u8>) -> bool {
        self.ocsp_responses.insert(der)
    }

    /// Add everything from `other` not already present.
    pub fn merge(&mut self, other: &LtvData) {
        self.certificates.extend(other.certificates.iter().map(<[u8]>::to_vec));
        self.crls.extend(other.crls.iter().map(<[u8]>::to_vec));
        self.ocsp_responses.extend(other.ocsp_responses.iter().map(<[u8]>::to_vec));
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.crls.is_empty() && self.ocsp_responses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_content() {
        let mut data = LtvData::new();
        assert!(data.add_crl(vec![1, 2, 3]));
        assert!(!data.add_crl(vec![1, 2, 3]));
        assert!(data.add_crl(vec![1, 2, 4]));
        assert_eq!(data.crls.len(), 2);
        assert_eq!(data.crls.byte_len(), 6);
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut a = LtvData::new();
        a.add_certificate(vec![1]);
        let mut b = LtvData::new();
        b.add_certificate(vec![2]);
        b.add_certificate(vec![1]);
        b.add_ocsp_response(vec![9]);
        a.merge(&b);
        let certs: Vec<&[u8]> = a.certificates.iter().collect();
        assert_eq!(certs, vec![&[1u8][..], &[2u8][..]]);
        assert_eq!(a.ocsp_responses.len(), 1);
    }
}
