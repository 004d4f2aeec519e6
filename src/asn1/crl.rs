//! Certificate revocation lists.

use crate::asn1::x509::{CertificateInfo, SignedEnvelope};
use crate::asn1::{oid, tlv};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use x509_parser::prelude::*;

/// Fields of a CRL needed for revocation checks.
#[derive(Debug, Clone)]
pub struct CrlInfo {
    /// Complete DER encoding
    pub der: Vec<u8>,
    /// Issuer DN, encoded
    pub issuer_raw: Vec<u8>,
    /// Issuer DN, display form
    pub issuer: String,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    /// Serial content octets of every revoked entry
    pub revoked_serials: Vec<Vec<u8>>,
    /// Carries the DeltaCRLIndicator extension
    pub is_delta: bool,
}

impl CrlInfo {
    /// Parse a DER CRL.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, crl) = CertificateRevocationList::from_der(der)
            .map_err(|e| Error::InvalidResponse(format!("failed to parse CRL: {}", e)))?;

        let delta_oid = oid::DELTA_CRL_INDICATOR.to_string();
        let is_delta = crl.extensions().iter().any(|ext| ext.oid.to_id_string() == delta_oid);

        Ok(Self {
            der: der.to_vec(),
            issuer_raw: crl.issuer().as_raw().to_vec(),
            issuer: crl.issuer().to_string(),
            this_update: to_utc(crl.last_update().timestamp()),
            next_update: crl.next_update().map(|t| to_utc(t.timestamp())),
            revoked_serials: crl
                .iter_revoked_certificates()
                .map(|entry| entry.raw_serial().to_vec())
                .collect(),
            is_delta,
        })
    }

    /// Whether `cert` is listed as revoked.
    pub fn is_revoked(&self, cert: &CertificateInfo) -> bool {
        let serial = tlv::strip_leading_zeros(&cert.serial);
        self.revoked_serials
            .iter()
            .any(|s| tlv::strip_leading_zeros(s) == serial)
    }

    /// Whether `issuer` is the CRL issuer by name.
    pub fn is_issued_by(&self, issuer: &CertificateInfo) -> bool {
        self.issuer_raw == issuer.subject_raw
    }

    /// Verify the CRL signature with the issuer's key.
    pub fn verify_signature(&self, issuer: &CertificateInfo) -> Result<()> {
        let envelope = SignedEnvelope::parse(&self.der)?;
        crate::asn1::signature::verify(
            &issuer.spki_der,
            &envelope.algorithm,
            None,
            envelope.tbs,
            &envelope.signature,
        )
    }
}

fn to_utc(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0).single().unwrap_or_default()
}
