//! RFC 4998 Evidence Record Syntax.
//!
//! Only the entry points exist; building or checking evidence records fails
//! with [`Error::Unsupported`]. Use [`archive_pdf`](crate::api::archive_pdf)
//! for PAdES archive timestamps.

use crate::error::{Error, Result};
use crate::timestamp::HashAlgorithm;

/// An EvidenceRecord over a set of data objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    /// DER EvidenceRecord
    pub der: Vec<u8>,
    pub digest_algorithm: HashAlgorithm,
}

impl EvidenceRecord {
    /// Build an evidence record over `data_objects`.
    pub fn build(data_objects: &[&[u8]], digest_algorithm: HashAlgorithm) -> Result<Self> {
        log::debug!(
            "Evidence record requested for {} object(s) with {}",
            data_objects.len(),
            digest_algorithm
        );
        Err(Error::Unsupported("RFC 4998 evidence records".to_string()))
    }

    /// Parse a DER EvidenceRecord.
    pub fn from_der(_der: &[u8]) -> Result<Self> {
        Err(Error::Unsupported("RFC 4998 evidence records".to_string()))
    }

    /// Check that this record protects `data_object`.
    pub fn verify(&self, _data_object: &[u8]) -> Result<()> {
        Err(Error::Unsupported("RFC 4998 evidence records".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_evidence_records_unsupported() {
        let err = EvidenceRecord::build(&[b"data"], HashAlgorithm::Sha256).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
        assert!(EvidenceRecord::from_der(&[0x30, 0x00]).is_err());
    }
}
