//! X.509 certificate helpers.

use crate::asn1::tlv::{self, read_tlv};
use crate::error::{Error, Result};
use crate::timestamp::HashAlgorithm;
use chrono::{DateTime, TimeZone, Utc};
use der::asn1::ObjectIdentifier;
use x509_parser::prelude::*;

/// The fields of a certificate that chain building, revocation and
/// validation need, detached from the parser's borrowed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Complete DER encoding
    pub der: Vec<u8>,
    /// Subject DN, display form
    pub subject: String,
    /// Issuer DN, display form
    pub issuer: String,
    /// Subject DN, encoded
    pub subject_raw: Vec<u8>,
    /// Issuer DN, encoded
    pub issuer_raw: Vec<u8>,
    /// Serial number content octets
    pub serial: Vec<u8>,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Subject Key Identifier
    pub subject_key_id: Option<Vec<u8>>,
    /// Authority Key Identifier (keyIdentifier)
    pub authority_key_id: Option<Vec<u8>>,
    /// AIA OCSP responder URLs
    pub ocsp_urls: Vec<String>,
    /// AIA CA Issuers URLs
    pub ca_issuer_urls: Vec<String>,
    /// CRL distribution point URLs
    pub crl_urls: Vec<String>,
    /// SubjectPublicKeyInfo, encoded
    pub spki_der: Vec<u8>,
    /// subjectPublicKey BIT STRING content (hashed for OCSP issuerKeyHash)
    pub public_key: Vec<u8>,
    /// BasicConstraints cA
    pub is_ca: bool,
    /// ExtendedKeyUsage contains id-kp-timeStamping
    pub has_timestamping_eku: bool,
    /// ExtendedKeyUsage is marked critical
    pub eku_critical: bool,
}

impl CertificateInfo {
    /// Parse a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse certificate: {}", e)))?;

        let mut info = Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            subject_raw: cert.subject().as_raw().to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            serial: cert.raw_serial().to_vec(),
            not_before: asn1_time(cert.validity().not_before.timestamp()),
            not_after: asn1_time(cert.validity().not_after.timestamp()),
            subject_key_id: None,
            authority_key_id: None,
            ocsp_urls: Vec::new(),
            ca_issuer_urls: Vec::new(),
            crl_urls: Vec::new(),
            spki_der: cert.public_key().raw.to_vec(),
            public_key: cert.public_key().subject_public_key.data.to_vec(),
            is_ca: false,
            has_timestamping_eku: false,
            eku_critical: false,
        };

        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(ski) => info.subject_key_id = Some(ski.0.to_vec()),
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    info.authority_key_id = aki.key_identifier.as_ref().map(|k| k.0.to_vec());
                },
                ParsedExtension::AuthorityInfoAccess(aia) => {
                    for desc in &aia.accessdescs {
                        if let GeneralName::URI(uri) = &desc.access_location {
                            let method = desc.access_method.to_id_string();
                            if method == crate::asn1::oid::AD_OCSP.to_string() {
                                info.ocsp_urls.push(uri.to_string());
                            } else if method == crate::asn1::oid::AD_CA_ISSUERS.to_string() {
                                info.ca_issuer_urls.push(uri.to_string());
                            }
                        }
                    }
                },
                ParsedExtension::CRLDistributionPoints(points) => {
                    for point in &points.points {
                        if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                            for name in names {
                                if let GeneralName::URI(uri) = name {
                                    info.crl_urls.push(uri.to_string());
                                }
                            }
                        }
                    }
                },
                ParsedExtension::BasicConstraints(bc) => info.is_ca = bc.ca,
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    info.has_timestamping_eku = eku.time_stamping;
                    info.eku_critical = ext.critical;
                },
                _ => {},
            }
        }

        Ok(info)
    }

    /// Serial number as uppercase hex.
    pub fn serial_hex(&self) -> String {
        hex::encode_upper(tlv::strip_leading_zeros(&self.serial))
    }

    /// Whether subject and issuer are the same name (and key identifiers agree when both present).
    pub fn is_self_signed(&self) -> bool {
        if self.subject_raw != self.issuer_raw {
            return false;
        }
        match (&self.authority_key_id, &self.subject_key_id) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }

    /// Digest of the DER encoding.
    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Vec<u8> {
        algorithm.digest(&self.der)
    }

    /// Whether `at` falls inside the validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Whether `serial` (content octets, any leading zeros) is this certificate's serial.
    pub fn has_serial(&self, serial: &[u8]) -> bool {
        tlv::strip_leading_zeros(&self.serial) == tlv::strip_leading_zeros(serial)
    }

    /// Verify that `issuer`'s key signed this certificate.
    pub fn verify_issued_by(&self, issuer: &CertificateInfo) -> Result<()> {
        let signed = SignedEnvelope::parse(&self.der)?;
        crate::asn1::signature::verify(
            &issuer.spki_der,
            &signed.algorithm,
            None,
            signed.tbs,
            &signed.signature,
        )
    }
}

/// The `SEQUENCE { tbs, algorithm, BIT STRING }` shape shared by certificates,
/// CRLs and OCSP basic responses.
#[derive(Debug)]
pub(crate) struct SignedEnvelope<'a> {
    /// Encoded to-be-signed part
    pub tbs: &'a [u8],
    /// Signature algorithm OID
    pub algorithm: ObjectIdentifier,
    /// Signature bits
    pub signature: Vec<u8>,
}

impl<'a> SignedEnvelope<'a> {
    pub fn parse(der: &'a [u8]) -> Result<Self> {
        let (outer, _) = read_tlv(der)?;
        let parts = outer.children()?;
        let [tbs, alg, sig] = parts.as_slice() else {
            return Err(Error::Asn1(format!("signed structure has {} parts, expected 3", parts.len())));
        };
        let alg_oid = alg.child(0, "signature algorithm")?;
        if alg_oid.tag != tlv::tag::OID {
            return Err(Error::Asn1("signature algorithm is not an OID".to_string()));
        }
        let algorithm = ObjectIdentifier::from_bytes(alg_oid.value)
            .map_err(|e| Error::Asn1(format!("bad signature algorithm OID: {}", e)))?;
        if sig.tag != tlv::tag::BIT_STRING || sig.value.is_empty() {
            return Err(Error::Asn1("signature is not a BIT STRING".to_string()));
        }
        Ok(Self {
            tbs: tbs.raw,
            algorithm,
            signature: sig.value[1..].to_vec(),
        })
    }
}

fn asn1_time(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_certificate_error() {
        let err = CertificateInfo::from_der(&[0x30, 0x03, 0x02, 0x01, 0x01]).unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn test_signed_envelope_shape() {
        // SEQUENCE { SEQUENCE {}, SEQUENCE { OID 1.2.840.10045.4.3.2 }, BIT STRING 00 AA }
        let der = [
            0x30, 0x12, 0x30, 0x00, 0x30, 0x0A, 0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02,
            0x03, 0x02, 0x00, 0xAA,
        ];
        let env = SignedEnvelope::parse(&der).unwrap();
        assert_eq!(env.tbs, &[0x30, 0x00]);
        assert_eq!(env.algorithm, crate::asn1::oid::ECDSA_WITH_SHA256);
        assert_eq!(env.signature, vec![0xAA]);
    }
}
