//! OCSP requests and responses (RFC 6960).
//!
//! Requests are built from `der`-derived types. Responses are walked with the
//! TLV reader: responders disagree on optional fields and tagging details,
//! and only a handful of fields are needed.

use crate::asn1::time::parse_generalized_time;
use crate::asn1::tlv::{self, read_tlv, Tlv};
use crate::asn1::x509::{CertificateInfo, SignedEnvelope};
use crate::asn1::oid;
use crate::error::{Error, Result};
use crate::timestamp::HashAlgorithm;
use chrono::{DateTime, Utc};
use der::asn1::{Int, ObjectIdentifier, OctetString};
use der::{Encode, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::{Extension, Extensions};

/// ```text
/// CertID ::= SEQUENCE {
///     hashAlgorithm   AlgorithmIdentifier,
///     issuerNameHash  OCTET STRING,
///     issuerKeyHash   OCTET STRING,
///     serialNumber    CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertId {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub issuer_name_hash: OctetString,
    pub issuer_key_hash: OctetString,
    pub serial_number: Int,
}

/// ```text
/// Request ::= SEQUENCE {
///     reqCert                  CertID,
///     singleRequestExtensions  [0] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Request {
    pub req_cert: CertId,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub single_request_extensions: Option<Extensions>,
}

/// ```text
/// TBSRequest ::= SEQUENCE {
///     version            [0] EXPLICIT Version DEFAULT v1,
///     requestorName      [1] EXPLICIT GeneralName OPTIONAL,
///     requestList        SEQUENCE OF Request,
///     requestExtensions  [2] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TbsRequest {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", default = "Default::default")]
    pub version: u8,
    pub request_list: Vec<Request>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub request_extensions: Option<Extensions>,
}

/// ```text
/// OCSPRequest ::= SEQUENCE {
///     tbsRequest         TBSRequest,
///     optionalSignature  [0] EXPLICIT Signature OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct OcspRequest {
    pub tbs_request: TbsRequest,
}

impl CertId {
    /// CertID for `cert` issued by `issuer`, hashed with `algorithm`.
    pub fn new(cert: &CertificateInfo, issuer: &CertificateInfo, algorithm: HashAlgorithm) -> Result<Self> {
        Ok(Self {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: algorithm.oid(),
                parameters: Some(der::asn1::Null.into()),
            },
            issuer_name_hash: OctetString::new(algorithm.digest(&cert.issuer_raw))?,
            issuer_key_hash: OctetString::new(algorithm.digest(&issuer.public_key))?,
            serial_number: Int::new(&cert.serial)?,
        })
    }
}

/// Encode an OCSP request for one certificate, with an optional nonce extension.
pub fn build_request(cert: &CertificateInfo, issuer: &CertificateInfo, nonce: Option<&[u8]>) -> Result<Vec<u8>> {
    let request_extensions = match nonce {
        Some(nonce) => Some(vec![Extension {
            extn_id: oid::OCSP_NONCE,
            critical: false,
            extn_value: OctetString::new(OctetString::new(nonce)?.to_der()?)?,
        }]),
        None => None,
    };
    let request = OcspRequest {
        tbs_request: TbsRequest {
            version: 0,
            request_list: vec![Request {
                req_cert: CertId::new(cert, issuer, HashAlgorithm::Sha1)?,
                single_request_extensions: None,
            }],
            request_extensions,
        },
    };
    Ok(request.to_der()?)
}

/// `OCSPResponseStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OcspResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
    Other(u8),
}

impl From<u64> for OcspResponseStatus {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::Successful,
            1 => Self::MalformedRequest,
            2 => Self::InternalError,
            3 => Self::TryLater,
            5 => Self::SigRequired,
            6 => Self::Unauthorized,
            other => Self::Other(other.min(u8::MAX as u64) as u8),
        }
    }
}

/// Status of one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked {
        /// revocationTime
        time: DateTime<Utc>,
        /// CRLReason, when given
        reason: Option<u8>,
    },
    Unknown,
}

/// CertID as found in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCertId {
    pub hash_algorithm: ObjectIdentifier,
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial: Vec<u8>,
}

/// One `SingleResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResponse {
    pub cert_id: ResponseCertId,
    pub status: CertStatus,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

impl SingleResponse {
    /// Whether this entry is about `cert` issued by `issuer`.
    pub fn matches(&self, cert: &CertificateInfo, issuer: &CertificateInfo) -> bool {
        let Some(alg) = HashAlgorithm::from_oid(&self.cert_id.hash_algorithm) else {
            return false;
        };
        cert.has_serial(&self.cert_id.serial)
            && self.cert_id.issuer_name_hash == alg.digest(&cert.issuer_raw)
            && self.cert_id.issuer_key_hash == alg.digest(&issuer.public_key)
    }
}

/// Decoded `BasicOCSPResponse`.
#[derive(Debug, Clone)]
pub struct BasicOcspResponse {
    /// Encoding, for signature checks
    pub der: Vec<u8>,
    pub produced_at: DateTime<Utc>,
    pub responses: Vec<SingleResponse>,
    /// Responder certificates, DER
    pub certificates: Vec<Vec<u8>>,
    /// Nonce extension value, when echoed
    pub nonce: Option<Vec<u8>>,
}

impl BasicOcspResponse {
    /// Verify the response signature.
    ///
    /// The signer is either the issuing CA itself or a delegated responder
    /// whose certificate is included in the response and issued by the CA.
    pub fn verify_signature(&self, issuer: &CertificateInfo) -> Result<()> {
        let envelope = SignedEnvelope::parse(&self.der)?;
        let direct = crate::asn1::signature::verify(
            &issuer.spki_der,
            &envelope.algorithm,
            None,
            envelope.tbs,
            &envelope.signature,
        );
        if direct.is_ok() {
            return direct;
        }

        for der in &self.certificates {
            let responder = CertificateInfo::from_der(der)?;
            if responder.verify_issued_by(issuer).is_err() {
                continue;
            }
            if crate::asn1::signature::verify(
                &responder.spki_der,
                &envelope.algorithm,
                None,
                envelope.tbs,
                &envelope.signature,
            )
            .is_ok()
            {
                return Ok(());
            }
        }
        direct
    }

    /// The entry for `cert`, if the responder answered about it.
    pub fn find(&self, cert: &CertificateInfo, issuer: &CertificateInfo) -> Option<&SingleResponse> {
        self.responses.iter().find(|r| r.matches(cert, issuer))
    }
}

/// Decoded `OCSPResponse`.
#[derive(Debug, Clone)]
pub struct OcspResponse {
    pub status: OcspResponseStatus,
    pub basic: Option<BasicOcspResponse>,
}

impl OcspResponse {
    /// Parse an `OCSPResponse`.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (outer, _) = read_tlv(der).map_err(invalid)?;
        let fields = outer.children().map_err(invalid)?;
        let status = fields
            .first()
            .filter(|f| f.tag == tlv::tag::ENUMERATED)
            .ok_or_else(|| Error::InvalidResponse("OCSP response has no status".to_string()))?
            .as_u64()?;
        let status = OcspResponseStatus::from(status);

        let basic = match fields.iter().find(|f| f.is_context(0)) {
            Some(explicit) => {
                let bytes = explicit.child(0, "ResponseBytes")?;
                let response_type = bytes.child(0, "responseType")?;
                let oid = ObjectIdentifier::from_bytes(response_type.value)
                    .map_err(|e| Error::InvalidResponse(format!("bad OCSP response type: {}", e)))?;
                if oid != oid::OCSP_BASIC {
                    return Err(Error::Unsupported(format!("OCSP response type {}", oid)));
                }
                let response = bytes.child(1, "response")?;
                Some(parse_basic(response.value)?)
            },
            None => None,
        };

        if status == OcspResponseStatus::Successful && basic.is_none() {
            return Err(Error::InvalidResponse("successful OCSP response without responseBytes".to_string()));
        }
        Ok(Self { status, basic })
    }
}

fn invalid(e: Error) -> Error {
    Error::InvalidResponse(format!("malformed OCSP response: {}", e))
}

fn parse_basic(der: &[u8]) -> Result<BasicOcspResponse> {
    let (basic, _) = read_tlv(der)?;
    let parts = basic.children()?;
    let tbs = parts
        .first()
        .ok_or_else(|| Error::InvalidResponse("BasicOCSPResponse is empty".to_string()))?;

    let certificates = match parts.iter().skip(3).find(|p| p.is_context(0)) {
        Some(explicit) => explicit
            .child(0, "certs")?
            .children()?
            .into_iter()
            .map(|c| c.raw.to_vec())
            .collect(),
        None => Vec::new(),
    };

    let mut fields = tbs.children()?.into_iter().peekable();
    if fields.peek().is_some_and(|f| f.is_context(0)) {
        fields.next(); // version
    }
    let _responder_id = fields.next();
    let produced_at = fields
        .next()
        .ok_or_else(|| Error::InvalidResponse("missing producedAt".to_string()))
        .and_then(|t| generalized_time(&t))?;
    let responses = fields
        .next()
        .ok_or_else(|| Error::InvalidResponse("missing responses".to_string()))?
        .children()?
        .iter()
        .map(parse_single)
        .collect::<Result<Vec<_>>>()?;

    let mut nonce = None;
    if let Some(explicit) = fields.find(|f| f.is_context(1)) {
        for ext in explicit.child(0, "responseExtensions")?.children()? {
            let ext_fields = ext.children()?;
            let is_nonce = ext_fields
                .first()
                .is_some_and(|id| ObjectIdentifier::from_bytes(id.value).ok() == Some(oid::OCSP_NONCE));
            if let (true, Some(value)) = (is_nonce, ext_fields.last()) {
                // extnValue wraps an OCTET STRING; some responders put the raw bytes directly
                nonce = Some(match read_tlv(value.value) {
                    Ok((inner, rest)) if inner.tag == tlv::tag::OCTET_STRING && rest.is_empty() => inner.value.to_vec(),
                    _ => value.value.to_vec(),
                });
            }
        }
    }

    Ok(BasicOcspResponse {
        der: basic.raw.to_vec(),
        produced_at,
        responses,
        certificates,
        nonce,
    })
}

fn parse_single(single: &Tlv<'_>) -> Result<SingleResponse> {
    let fields = single.children()?;
    let [cert_id, status, this_update, rest @ ..] = fields.as_slice() else {
        return Err(Error::InvalidResponse("SingleResponse is truncated".to_string()));
    };

    let id_fields = cert_id.children()?;
    let [alg, name_hash, key_hash, serial] = id_fields.as_slice() else {
        return Err(Error::InvalidResponse("CertID is malformed".to_string()));
    };
    let hash_algorithm = ObjectIdentifier::from_bytes(alg.child(0, "hash algorithm")?.value)
        .map_err(|e| Error::InvalidResponse(format!("bad CertID algorithm: {}", e)))?;

    let status = match status.tag {
        0x80 => CertStatus::Good,
        0xA1 => {
            let info = status.children()?;
            let time = info
                .first()
                .ok_or_else(|| Error::InvalidResponse("RevokedInfo without time".to_string()))
                .and_then(generalized_time)?;
            let reason = info
                .iter()
                .find(|f| f.is_context(0))
                .and_then(|r| r.children().ok())
                .and_then(|c| c.first().and_then(|e| e.value.first().copied()));
            CertStatus::Revoked { time, reason }
        },
        _ => CertStatus::Unknown,
    };

    let next_update = match rest.iter().find(|f| f.is_context(0)) {
        Some(explicit) => Some(generalized_time(&explicit.child(0, "nextUpdate")?)?),
        None => None,
    };

    Ok(SingleResponse {
        cert_id: ResponseCertId {
            hash_algorithm,
            issuer_name_hash: name_hash.value.to_vec(),
            issuer_key_hash: key_hash.value.to_vec(),
            serial: serial.value.to_vec(),
        },
        status,
        this_update: generalized_time(this_update)?,
        next_update,
    })
}

fn generalized_time(t: &Tlv<'_>) -> Result<DateTime<Utc>> {
    std::str::from_utf8(t.value)
        .ok()
        .and_then(parse_generalized_time)
        .ok_or_else(|| Error::InvalidResponse("malformed GeneralizedTime".to_string()))
}
