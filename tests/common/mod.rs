//! Shared fixtures for the integration tests.
//!
//! - minimal PDFs with correct cross-reference tables
//! - a throwaway P-256 PKI (root CA and TSA certificate) and CRLs
//! - [`TestTsa`], which mints real RFC 3161 tokens
//! - [`StubTransport`], an in-memory [`HttpTransport`]

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use der::asn1::{BitString, Ia5String, ObjectIdentifier, OctetString, UtcTime, Uint};
use der::{Any, Decode, Encode};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use pades_timestamp::asn1::cms::CmsAlgorithmProtection;
use pades_timestamp::asn1::oid;
use pades_timestamp::asn1::time::GenTime;
use pades_timestamp::asn1::tsp::{Accuracy, MessageImprint, PkiStatusInfo, TimeStampResp, TstInfo};
use pades_timestamp::network::{
    CircuitBreakerConfig, EndpointConfig, Fetcher, HttpRequest, HttpResponse, HttpTransport, NetworkConfig,
};
use pades_timestamp::timestamp::parse_timestamp_request;
use pades_timestamp::{Error, HashAlgorithm, Result};
use parking_lot::Mutex;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, BasicConstraints, CrlDistributionPoints, ExtendedKeyUsage,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

pub const TSA_URL: &str = "http://tsa.test/tsr";
pub const CRL_URL: &str = "http://crl.test/root.crl";
pub const CA_ISSUER_URL: &str = "http://aia.test/root.cer";
pub const OCSP_URL: &str = "http://ocsp.test/";

pub const ROOT_NAME: &str = "CN=PAdES Test Root,O=PAdES Test";
pub const TSA_NAME: &str = "CN=PAdES Test TSA,O=PAdES Test";

pub const TSA_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1");

const ID_CE_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const ID_CE_EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");
const ID_CE_CRL_DISTRIBUTION_POINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.31");
const ID_PE_AUTHORITY_INFO_ACCESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.1");

// 2020-01-01T00:00:00Z .. 2045-01-01T00:00:00Z
const NOT_BEFORE: u64 = 1_577_836_800;
const NOT_AFTER: u64 = 2_366_841_600;
// 2024-01-01T00:00:00Z
const CRL_THIS_UPDATE: u64 = 1_704_067_200;

// ---------------------------------------------------------------------------
// PDFs
// ---------------------------------------------------------------------------

/// A classic-xref PDF whose objects are numbered from 1 in order; object 1 is the catalog.
pub fn pdf_from_objects(objects: &[&str]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /ID [<0123456789ABCDEF0123456789ABCDEF> <0123456789ABCDEF0123456789ABCDEF>] >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// Catalog, page tree and one empty Letter page.
pub fn minimal_pdf() -> Vec<u8> {
    pdf_from_objects(&[
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
    ])
}

/// Highest object number stored in [`object_stream_pdf`]'s object stream.
pub const OBJSTM_MAX_OBJECT: u32 = 30;

/// A PDF 1.5 file whose catalog, page tree and page live in object stream 4,
/// indexed by cross-reference stream 5. The stream also holds object
/// [`OBJSTM_MAX_OBJECT`], which has no `N G obj` header anywhere.
pub fn object_stream_pdf() -> Vec<u8> {
    let members: [(u32, &str); 4] = [
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>"),
        (OBJSTM_MAX_OBJECT, "(unreferenced)"),
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (id, text) in members {
        header.push_str(&format!("{} {} ", id, body.len()));
        body.push_str(text);
        body.push('\n');
    }
    let content = format!("{}{}", header, body);

    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let objstm_offset = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            members.len(),
            header.len(),
            content.len(),
            content
        )
        .as_bytes(),
    );

    // /W [1 4 2]: type, offset or stream number, generation or index
    let row = |kind: u8, field: u32, extra: u16| {
        let mut r = vec![kind];
        r.extend_from_slice(&field.to_be_bytes());
        r.extend_from_slice(&extra.to_be_bytes());
        r
    };
    let xref_offset = out.len();
    let rows = [
        row(0, 0, 65535),
        row(2, 4, 0),
        row(2, 4, 1),
        row(2, 4, 2),
        row(1, objstm_offset as u32, 0),
        row(1, xref_offset as u32, 0),
        row(2, 4, 3),
    ]
    .concat();
    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size {} /Index [0 6 {} 1] /W [1 4 2] /Root 1 0 R /ID [<0123456789ABCDEF0123456789ABCDEF> <0123456789ABCDEF0123456789ABCDEF>] /Length {} >>\nstream\n",
            OBJSTM_MAX_OBJECT + 1,
            OBJSTM_MAX_OBJECT,
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// Count of `needle` in `haystack`.
pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

// ---------------------------------------------------------------------------
// DER helpers
// ---------------------------------------------------------------------------

fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len < 0x100 {
        out.extend_from_slice(&[0x81, len as u8]);
    } else if len < 0x10000 {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    } else {
        out.extend_from_slice(&[0x83, (len >> 16) as u8, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(value);
    out
}

/// `tag`-tagged SET OF in DER order.
fn der_set(tag: u8, mut elements: Vec<Vec<u8>>) -> Vec<u8> {
    elements.sort();
    tlv(tag, &elements.concat())
}

fn algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned { oid, parameters: None }
}

fn attribute(oid: ObjectIdentifier, value_der: Vec<u8>) -> Vec<u8> {
    let mut body = oid.to_der().unwrap();
    body.extend(tlv(0x31, &value_der));
    tlv(0x30, &body)
}

fn extension<T: Encode>(oid: ObjectIdentifier, critical: bool, value: &T) -> Extension {
    Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

fn utc(secs: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

fn uri(url: &str) -> GeneralName {
    GeneralName::UniformResourceIdentifier(Ia5String::new(url).unwrap())
}

// ---------------------------------------------------------------------------
// PKI
// ---------------------------------------------------------------------------

/// A certificate and the key it certifies.
pub struct TestCert {
    pub key: SigningKey,
    pub der: Vec<u8>,
    pub name: Name,
    pub serial: u8,
}

/// How the TSA certificate is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsaProfile {
    /// Critical id-kp-timeStamping EKU
    pub timestamping_eku: bool,
    /// CRL distribution point [`CRL_URL`]
    pub crl_distribution_point: bool,
    /// AIA CA Issuers [`CA_ISSUER_URL`]
    pub ca_issuer: bool,
    /// AIA OCSP responder [`OCSP_URL`]
    pub ocsp_responder: bool,
}

impl Default for TsaProfile {
    fn default() -> Self {
        Self {
            timestamping_eku: true,
            crl_distribution_point: true,
            ca_issuer: false,
            ocsp_responder: false,
        }
    }
}

/// Root CA and the TSA certificate it issued.
pub struct TestPki {
    pub root: TestCert,
    pub tsa: TestCert,
}

impl TestPki {
    pub fn new() -> Self {
        Self::with_profile(TsaProfile::default())
    }

    pub fn with_profile(profile: TsaProfile) -> Self {
        let root_key = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let tsa_key = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let root_name = Name::from_str(ROOT_NAME).unwrap();
        let tsa_name = Name::from_str(TSA_NAME).unwrap();

        let root_der = issue(
            &root_name,
            1,
            &root_key,
            &root_name,
            &root_key,
            vec![extension(
                ID_CE_BASIC_CONSTRAINTS,
                true,
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
            )],
        );

        let mut extensions = Vec::new();
        if profile.timestamping_eku {
            extensions.push(extension(
                ID_CE_EXT_KEY_USAGE,
                true,
                &ExtendedKeyUsage(vec![oid::KP_TIME_STAMPING]),
            ));
        }
        if profile.crl_distribution_point {
            extensions.push(extension(
                ID_CE_CRL_DISTRIBUTION_POINTS,
                false,
                &CrlDistributionPoints(vec![DistributionPoint {
                    distribution_point: Some(DistributionPointName::FullName(vec![uri(CRL_URL)])),
                    reasons: None,
                    crl_issuer: None,
                }]),
            ));
        }
        let mut access = Vec::new();
        if profile.ocsp_responder {
            access.push(AccessDescription {
                access_method: oid::AD_OCSP,
                access_location: uri(OCSP_URL),
            });
        }
        if profile.ca_issuer {
            access.push(AccessDescription {
                access_method: oid::AD_CA_ISSUERS,
                access_location: uri(CA_ISSUER_URL),
            });
        }
        if !access.is_empty() {
            extensions.push(extension(
                ID_PE_AUTHORITY_INFO_ACCESS,
                false,
                &AuthorityInfoAccessSyntax(access),
            ));
        }
        let tsa_der = issue(&tsa_name, 2, &tsa_key, &root_name, &root_key, extensions);

        Self {
            root: TestCert {
                key: root_key,
                der: root_der,
                name: root_name,
                serial: 1,
            },
            tsa: TestCert {
                key: tsa_key,
                der: tsa_der,
                name: tsa_name,
                serial: 2,
            },
        }
    }

    /// A CRL signed by the root listing `revoked` serials.
    pub fn crl(&self, revoked: &[u8], delta: bool) -> Vec<u8> {
        let revoked_certificates = if revoked.is_empty() {
            None
        } else {
            Some(
                revoked
                    .iter()
                    .map(|serial| RevokedCert {
                        serial_number: SerialNumber::new(&[*serial]).unwrap(),
                        revocation_date: utc(CRL_THIS_UPDATE),
                        crl_entry_extensions: None,
                    })
                    .collect(),
            )
        };
        let crl_extensions =
            delta.then(|| vec![extension(oid::DELTA_CRL_INDICATOR, true, &Uint::new(&[0x01]).unwrap())]);

        let tbs = TbsCertList {
            version: Version::V2,
            signature: algorithm(oid::ECDSA_WITH_SHA256),
            issuer: self.root.name.clone(),
            this_update: utc(CRL_THIS_UPDATE),
            next_update: Some(utc(NOT_AFTER)),
            revoked_certificates,
            crl_extensions,
        };
        let signature: DerSignature = self.root.key.sign(&tbs.to_der().unwrap());
        CertificateList {
            tbs_cert_list: tbs,
            signature_algorithm: algorithm(oid::ECDSA_WITH_SHA256),
            signature: BitString::from_bytes(signature.as_bytes()).unwrap(),
        }
        .to_der()
        .unwrap()
    }
}

fn issue(
    subject: &Name,
    serial: u8,
    subject_key: &SigningKey,
    issuer: &Name,
    issuer_key: &SigningKey,
    extensions: Vec<Extension>,
) -> Vec<u8> {
    let spki_der = subject_key.verifying_key().to_public_key_der().unwrap();
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[serial]).unwrap(),
        signature: algorithm(oid::ECDSA_WITH_SHA256),
        issuer: issuer.clone(),
        validity: Validity {
            not_before: utc(NOT_BEFORE),
            not_after: utc(NOT_AFTER),
        },
        subject: subject.clone(),
        subject_public_key_info: SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() { None } else { Some(extensions) },
    };
    let signature: DerSignature = issuer_key.sign(&tbs.to_der().unwrap());
    Certificate {
        tbs_certificate: tbs,
        signature_algorithm: algorithm(oid::ECDSA_WITH_SHA256),
        signature: BitString::from_bytes(signature.as_bytes()).unwrap(),
    }
    .to_der()
    .unwrap()
}

// ---------------------------------------------------------------------------
// TSA
// ---------------------------------------------------------------------------

/// CMSAlgorithmProtection in the signed attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Absent,
    Matching,
    /// Claims SHA-384 while the signer digests with SHA-256
    Mismatched,
}

/// How the TSA answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsaMode {
    Honest,
    WrongNonce,
    WrongImprint,
}

/// Which certificates go into the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedded {
    None,
    Tsa,
    TsaAndRoot,
}

/// A TSA signing with the test PKI's TSA key.
pub struct TestTsa {
    pub pki: TestPki,
    pub protection: Protection,
    pub embedded: Embedded,
}

impl TestTsa {
    pub fn new() -> Self {
        Self::with_pki(TestPki::new())
    }

    pub fn with_pki(pki: TestPki) -> Self {
        Self {
            pki,
            protection: Protection::Absent,
            embedded: Embedded::TsaAndRoot,
        }
    }

    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    pub fn embedded(mut self, embedded: Embedded) -> Self {
        self.embedded = embedded;
        self
    }

    /// A TimeStampToken over `hash`, generated now.
    pub fn mint(&self, hash: &[u8], algorithm: HashAlgorithm, nonce: Option<Uint>) -> Vec<u8> {
        let now = DateTime::<Utc>::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let tst = TstInfo {
            version: 1,
            policy: TSA_POLICY,
            message_imprint: MessageImprint {
                hash_algorithm: algorithm_for(algorithm),
                hashed_message: OctetString::new(hash).unwrap(),
            },
            serial_number: Uint::new(&[0x01, 0x2C]).unwrap(),
            gen_time: GenTime(now),
            accuracy: Some(Accuracy {
                seconds: Some(1),
                millis: None,
                micros: None,
            }),
            ordering: false,
            nonce,
            tsa: None,
            extensions: None,
        };
        let tst_der = tst.to_der().unwrap();

        let mut attrs = vec![
            attribute(oid::ATTR_CONTENT_TYPE, oid::CT_TST_INFO.to_der().unwrap()),
            attribute(
                oid::ATTR_MESSAGE_DIGEST,
                OctetString::new(HashAlgorithm::Sha256.digest(&tst_der)).unwrap().to_der().unwrap(),
            ),
        ];
        let protected_digest = match self.protection {
            Protection::Absent => None,
            Protection::Matching => Some(oid::SHA256),
            Protection::Mismatched => Some(oid::SHA384),
        };
        if let Some(digest) = protected_digest {
            let protection = CmsAlgorithmProtection {
                digest_algorithm: self::algorithm(digest),
                signature_algorithm: Some(self::algorithm(oid::ECDSA_WITH_SHA256)),
                mac_algorithm: None,
            };
            attrs.push(attribute(oid::ATTR_CMS_ALGORITHM_PROTECTION, protection.to_der().unwrap()));
        }
        let signed_attrs = der_set(0x31, attrs);
        let signature: DerSignature = self.pki.tsa.key.sign(&signed_attrs);

        let mut signer_info = vec![0x02, 0x01, 0x01];
        let mut sid = self.pki.root.name.to_der().unwrap();
        sid.extend(SerialNumber::<x509_cert::certificate::Rfc5280>::new(&[self.pki.tsa.serial]).unwrap().to_der().unwrap());
        signer_info.extend(tlv(0x30, &sid));
        signer_info.extend(self::algorithm(oid::SHA256).to_der().unwrap());
        let mut implicit_attrs = signed_attrs;
        implicit_attrs[0] = 0xA0;
        signer_info.extend(implicit_attrs);
        signer_info.extend(self::algorithm(oid::ECDSA_WITH_SHA256).to_der().unwrap());
        signer_info.extend(tlv(0x04, signature.as_bytes()));

        let mut signed_data = vec![0x02, 0x01, 0x03];
        signed_data.extend(der_set(0x31, vec![self::algorithm(oid::SHA256).to_der().unwrap()]));
        let mut encap = oid::CT_TST_INFO.to_der().unwrap();
        encap.extend(tlv(0xA0, &tlv(0x04, &tst_der)));
        signed_data.extend(tlv(0x30, &encap));
        let certificates = match self.embedded {
            Embedded::None => Vec::new(),
            Embedded::Tsa => vec![self.pki.tsa.der.clone()],
            Embedded::TsaAndRoot => vec![self.pki.tsa.der.clone(), self.pki.root.der.clone()],
        };
        if !certificates.is_empty() {
            signed_data.extend(der_set(0xA0, certificates));
        }
        signed_data.extend(der_set(0x31, vec![tlv(0x30, &signer_info)]));

        let mut content_info = oid::SIGNED_DATA.to_der().unwrap();
        content_info.extend(tlv(0xA0, &tlv(0x30, &signed_data)));
        tlv(0x30, &content_info)
    }

    /// Answer a DER TimeStampReq.
    pub fn respond(&self, request: &[u8], mode: TsaMode) -> Vec<u8> {
        let req = parse_timestamp_request(request).unwrap();
        let algorithm = HashAlgorithm::from_oid(&req.message_imprint.hash_algorithm.oid).unwrap();
        let hash = match mode {
            TsaMode::WrongImprint => algorithm.digest(b"some other document"),
            _ => req.message_imprint.hashed_message.as_bytes().to_vec(),
        };
        let nonce = match mode {
            TsaMode::WrongNonce => Some(Uint::new(&[0x7F, 0x01, 0x02, 0x03]).unwrap()),
            _ => req.nonce.clone(),
        };
        granted_response(&self.mint(&hash, algorithm, nonce))
    }
}

fn algorithm_for(hash: HashAlgorithm) -> AlgorithmIdentifierOwned {
    algorithm(hash.oid())
}

/// TimeStampResp with status granted around `token`.
pub fn granted_response(token: &[u8]) -> Vec<u8> {
    TimeStampResp {
        status: PkiStatusInfo {
            status: 0,
            status_string: None,
            fail_info: None,
        },
        time_stamp_token: Some(Any::from_der(token).unwrap()),
    }
    .to_der()
    .unwrap()
}

/// TimeStampResp with status rejection and `text`.
pub fn rejection_response(text: &str) -> Vec<u8> {
    TimeStampResp {
        status: PkiStatusInfo {
            status: 2,
            status_string: Some(vec![text.to_string()]),
            fail_info: None,
        },
        time_stamp_token: None,
    }
    .to_der()
    .unwrap()
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// What a URL answers.
pub enum Route {
    /// 200 with this body
    Body(Vec<u8>),
    /// An empty response with this status
    Status(u16),
    /// A TSA
    Tsa(Arc<TestTsa>, TsaMode),
}

/// In-memory transport. Unrouted URLs fail like an unreachable host.
#[derive(Default)]
pub struct StubTransport {
    routes: HashMap<String, Route>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    /// Requests sent to `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.calls.lock().push(request.url.clone());
        match self.routes.get(&request.url) {
            Some(Route::Body(body)) => Ok(HttpResponse::ok(body.clone())),
            Some(Route::Status(status)) => Ok(HttpResponse {
                status: *status,
                content_type: None,
                body: Vec::new(),
            }),
            Some(Route::Tsa(tsa, mode)) => Ok(HttpResponse {
                status: 200,
                content_type: Some("application/timestamp-reply".to_string()),
                body: tsa.respond(&request.body, *mode),
            }),
            None => Err(Error::network(&request.url, "connection refused")),
        }
    }
}

/// Endpoints with 1 ms backoff and `retries` retries, breaker threshold 5.
pub fn fast_network(retries: u32) -> NetworkConfig {
    let endpoint = EndpointConfig::tsa()
        .with_timeout_ms(2_000)
        .with_max_retries(retries)
        .with_initial_backoff_ms(1);
    NetworkConfig::default()
        .with_tsa(endpoint)
        .with_ocsp(endpoint)
        .with_crl(endpoint)
        .with_ca_issuer(endpoint)
        .with_circuit_breaker(CircuitBreakerConfig::default().with_failure_threshold(5))
}

/// A fetcher over `transport` with [`fast_network`] and no retries.
pub fn fetcher(transport: Arc<StubTransport>) -> Fetcher {
    Fetcher::with_transport(transport, fast_network(0))
}

/// The stub routes most tests need: an honest TSA and the root's empty CRL.
pub fn honest_transport(tsa: &Arc<TestTsa>) -> StubTransport {
    StubTransport::new()
        .route(TSA_URL, Route::Tsa(Arc::clone(tsa), TsaMode::Honest))
        .route(CRL_URL, Route::Body(tsa.pki.crl(&[], false)))
}
