//! CMS SignedData timestamp tokens (RFC 3161 section 2.4.2, RFC 5652).

use crate::asn1::tlv::{self, read_tlv};
use crate::asn1::tsp::TstInfo;
use crate::asn1::x509::CertificateInfo;
use crate::asn1::{oid, uint_to_decimal};
use crate::error::{Error, Result};
use crate::timestamp::{HashAlgorithm, TimestampAccuracy, TimestampInfo};
use chrono::{DateTime, Utc};
use ::cms::content_info::ContentInfo;
use ::cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralName;

/// ```text
/// CMSAlgorithmProtection ::= SEQUENCE {
///     digestAlgorithm     DigestAlgorithmIdentifier,
///     signatureAlgorithm  [1] SignatureAlgorithmIdentifier OPTIONAL,
///     macAlgorithm        [2] MessageAuthenticationCodeAlgorithm OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CmsAlgorithmProtection {
    pub digest_algorithm: AlgorithmIdentifierOwned,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub signature_algorithm: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub mac_algorithm: Option<AlgorithmIdentifierOwned>,
}

/// A parsed timestamp token.
#[derive(Debug, Clone)]
pub struct TimestampToken {
    der: Vec<u8>,
    tst_der: Vec<u8>,
    tst_info: TstInfo,
    digest_algorithms: Vec<ObjectIdentifier>,
    certificates: Vec<Vec<u8>>,
    signer: SignerInfo,
    /// Signed attributes as signed: the `[0]` field re-tagged as SET OF
    signed_attrs_der: Option<Vec<u8>>,
}

impl TimestampToken {
    /// Parse a token. Trailing bytes after the ContentInfo (e.g. `/Contents` zero padding) are ignored.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let len = tlv::encoded_len(der)?;
        let der = &der[..len];

        let content_info = ContentInfo::from_der(der)
            .map_err(|e| Error::InvalidResponse(format!("token is not a CMS ContentInfo: {}", e)))?;
        if content_info.content_type != oid::SIGNED_DATA {
            return Err(Error::InvalidResponse(format!(
                "token content type is {}, expected SignedData",
                content_info.content_type
            )));
        }
        let signed_data: SignedData = content_info
            .content
            .decode_as()
            .map_err(|e| Error::InvalidResponse(format!("malformed SignedData: {}", e)))?;

        let encap = &signed_data.encap_content_info;
        if encap.econtent_type != oid::CT_TST_INFO {
            return Err(Error::InvalidResponse(format!(
                "encapsulated content is {}, expected TSTInfo",
                encap.econtent_type
            )));
        }
        let econtent = encap
            .econtent
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("token has no encapsulated TSTInfo".to_string()))?;
        let tst_der = econtent.value().to_vec();
        let tst_info = TstInfo::from_der(&tst_der)
            .map_err(|e| Error::InvalidResponse(format!("malformed TSTInfo: {}", e)))?;

        let signer = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("token has no SignerInfo".to_string()))?;

        let (certificates, signed_attrs_der) = raw_parts(der)?;

        Ok(Self {
            der: der.to_vec(),
            tst_der,
            tst_info,
            digest_algorithms: signed_data.digest_algorithms.iter().map(|a| a.oid).collect(),
            certificates,
            signer,
            signed_attrs_der,
        })
    }

    /// Encoded token, without padding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Decoded TSTInfo.
    pub fn tst_info(&self) -> &TstInfo {
        &self.tst_info
    }

    /// Encoded TSTInfo, as signed.
    pub fn tst_der(&self) -> &[u8] {
        &self.tst_der
    }

    /// Certificates carried in the SignedData, DER.
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    /// Digest algorithm of the TSTInfo message imprint.
    pub fn imprint_algorithm(&self) -> Result<HashAlgorithm> {
        let alg = &self.tst_info.message_imprint.hash_algorithm.oid;
        HashAlgorithm::from_oid(alg).ok_or_else(|| Error::Unsupported(format!("imprint hash algorithm {}", alg)))
    }

    /// Digest algorithm the signer used.
    pub fn signer_digest_algorithm(&self) -> Result<HashAlgorithm> {
        let alg = &self.signer.digest_alg.oid;
        HashAlgorithm::from_oid(alg).ok_or_else(|| Error::Unsupported(format!("signer digest algorithm {}", alg)))
    }

    /// The caller-facing view of the TSTInfo.
    pub fn info(&self) -> Result<TimestampInfo> {
        let tst = &self.tst_info;
        let tsa_name = tst.tsa.as_ref().and_then(|name| match name {
            GeneralName::DirectoryName(dn) => Some(dn.to_string()),
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            GeneralName::DnsName(dns) => Some(dns.to_string()),
            GeneralName::Rfc822Name(mail) => Some(mail.to_string()),
            _ => None,
        });
        Ok(TimestampInfo {
            gen_time: tst.gen_time.to_datetime(),
            policy: tst.policy.to_string(),
            hash_algorithm: self.imprint_algorithm()?,
            message_digest: hex::encode(tst.message_imprint.hashed_message.as_bytes()),
            serial_number: uint_to_decimal(tst.serial_number.as_bytes()),
            has_certificate: !self.certificates.is_empty(),
            nonce: tst.nonce.as_ref().map(|n| n.as_bytes().to_vec()),
            tsa_name,
            accuracy: tst.accuracy.map(|a| TimestampAccuracy {
                seconds: a.seconds.unwrap_or(0),
                millis: a.millis.unwrap_or(0),
                micros: a.micros.unwrap_or(0),
            }),
            ordering: tst.ordering,
        })
    }

    /// The embedded certificate that issued this token, if present.
    pub fn signer_certificate(&self) -> Result<Option<CertificateInfo>> {
        for der in &self.certificates {
            let cert = CertificateInfo::from_der(der)?;
            let matches = match &self.signer.sid {
                SignerIdentifier::IssuerAndSerialNumber(ias) => {
                    cert.has_serial(ias.serial_number.as_bytes()) && ias.issuer.to_der()? == cert.issuer_raw
                },
                SignerIdentifier::SubjectKeyIdentifier(ski) => {
                    cert.subject_key_id.as_deref() == Some(ski.0.as_bytes())
                },
            };
            if matches {
                return Ok(Some(cert));
            }
        }
        Ok(None)
    }

    /// Signed attribute values for `attr`, first value only.
    fn signed_attribute(&self, attr: ObjectIdentifier) -> Option<&der::Any> {
        self.signer
            .signed_attrs
            .as_ref()?
            .iter()
            .find(|a| a.oid == attr)
            .and_then(|a| a.values.iter().next())
    }

    /// `signingTime` signed attribute, when present.
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        let any = self.signed_attribute(oid::ATTR_SIGNING_TIME)?;
        let time = x509_cert::time::Time::from_der(&any.to_der().ok()?).ok()?;
        let secs = time.to_unix_duration().as_secs() as i64;
        DateTime::from_timestamp(secs, 0)
    }

    /// Verify the token with its embedded signer certificate, returning that certificate.
    pub fn verify_signature(&self) -> Result<CertificateInfo> {
        let cert = self
            .signer_certificate()?
            .ok_or_else(|| Error::Verification("token does not carry the TSA certificate".to_string()))?;
        self.verify_signature_with(&cert)?;
        Ok(cert)
    }

    /// Verify the SignerInfo signature against `cert`.
    ///
    /// With signed attributes present, `contentType` must be id-ct-TSTInfo and
    /// `messageDigest` must equal the digest of the encapsulated TSTInfo; the
    /// signature then covers the DER SET OF attributes.
    pub fn verify_signature_with(&self, cert: &CertificateInfo) -> Result<()> {
        let digest = self.signer_digest_algorithm()?;
        let message: &[u8] = match &self.signed_attrs_der {
            Some(attrs) => {
                let content_type: ObjectIdentifier = self
                    .signed_attribute(oid::ATTR_CONTENT_TYPE)
                    .ok_or_else(|| Error::Verification("signed attributes lack contentType".to_string()))?
                    .decode_as()?;
                if content_type != oid::CT_TST_INFO {
                    return Err(Error::Verification(format!(
                        "contentType attribute is {}, expected TSTInfo",
                        content_type
                    )));
                }
                let message_digest: OctetString = self
                    .signed_attribute(oid::ATTR_MESSAGE_DIGEST)
                    .ok_or_else(|| Error::Verification("signed attributes lack messageDigest".to_string()))?
                    .decode_as()?;
                if message_digest.as_bytes() != digest.digest(&self.tst_der).as_slice() {
                    return Err(Error::HashMismatch(
                        "messageDigest attribute does not match the TSTInfo".to_string(),
                    ));
                }
                attrs
            },
            None => &self.tst_der,
        };

        crate::asn1::signature::verify(
            &cert.spki_der,
            &self.signer.signature_algorithm.oid,
            Some(digest),
            message,
            self.signer.signature.as_bytes(),
        )
    }

    /// RFC 8933 algorithm-identifier protection.
    ///
    /// The signer's digest algorithm must be declared in `digestAlgorithms`;
    /// when the CMSAlgorithmProtection attribute is present its digest (and
    /// signature) algorithm must equal the SignerInfo's.
    pub fn check_algorithm_protection(&self) -> Result<()> {
        let digest_alg = self.signer.digest_alg.oid;
        if !self.digest_algorithms.contains(&digest_alg) {
            return Err(Error::Verification(format!(
                "signer digest algorithm {} is not listed in SignedData.digestAlgorithms",
                digest_alg
            )));
        }
        if let Some(any) = self.signed_attribute(oid::ATTR_CMS_ALGORITHM_PROTECTION) {
            let protection: CmsAlgorithmProtection = any.decode_as()?;
            if protection.digest_algorithm.oid != digest_alg {
                return Err(Error::Verification(format!(
                    "CMSAlgorithmProtection digest {} differs from signer digest {}",
                    protection.digest_algorithm.oid, digest_alg
                )));
            }
            if let Some(sig_alg) = &protection.signature_algorithm {
                if sig_alg.oid != self.signer.signature_algorithm.oid {
                    return Err(Error::Verification(format!(
                        "CMSAlgorithmProtection signature algorithm {} differs from {}",
                        sig_alg.oid, self.signer.signature_algorithm.oid
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the CMSAlgorithmProtection attribute is present.
    pub fn has_algorithm_protection(&self) -> bool {
        self.signed_attribute(oid::ATTR_CMS_ALGORITHM_PROTECTION).is_some()
    }
}

/// Certificates and signed attributes exactly as encoded.
///
/// Re-encoding the decoded SET OF may reorder it, which would break the signature.
fn raw_parts(der: &[u8]) -> Result<(Vec<Vec<u8>>, Option<Vec<u8>>)> {
    let (content_info, _) = read_tlv(der)?;
    let explicit = content_info.child(1, "SignedData content")?;
    let signed_data = explicit.child(0, "SignedData")?;
    let fields = signed_data.children()?;

    let certificates = fields
        .iter()
        .find(|f| f.tag == 0xA0)
        .map(|set| -> Result<Vec<Vec<u8>>> {
            Ok(set
                .children()?
                .into_iter()
                .filter(|c| c.tag == tlv::tag::SEQUENCE)
                .map(|c| c.raw.to_vec())
                .collect())
        })
        .transpose()?
        .unwrap_or_default();

    let signer_infos = fields
        .last()
        .filter(|f| f.tag == tlv::tag::SET)
        .ok_or_else(|| Error::InvalidResponse("SignedData has no signerInfos".to_string()))?;
    let signer = signer_infos.child(0, "SignerInfo")?;
    let signed_attrs = signer.children()?.into_iter().find(|f| f.tag == 0xA0).map(|attrs| {
        let mut raw = attrs.raw.to_vec();
        raw[0] = tlv::tag::SET;
        raw
    });

    Ok((certificates, signed_attrs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_cms() {
        let err = TimestampToken::from_der(&[0x30, 0x03, 0x02, 0x01, 0x01]).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_rejects_deep_indefinite_nesting() {
        let hostile = [0x30u8, 0x80].repeat(8000);
        let err = TimestampToken::from_der(&hostile).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"), "{}", err);
    }

    #[test]
    fn test_rejects_truncated() {
        assert!(TimestampToken::from_der(&[0x30, 0x82, 0x10, 0x00, 0x06]).is_err());
    }
}
