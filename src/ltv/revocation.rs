//! Revocation status via OCSP and CRLs.

use crate::asn1::ocsp::{self, CertStatus, OcspResponse, OcspResponseStatus};
use crate::asn1::{CertificateInfo, CrlInfo};
use crate::config::RevocationOptions;
use crate::error::{Error, Result};
use crate::ltv::chain::CertificateChain;
use crate::network::Fetcher;
use chrono::{DateTime, Utc};
use rand::RngCore;

/// Status of one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationStatus {
    Good,
    Revoked,
    Unknown,
}

/// Where the evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationSource {
    Ocsp,
    Crl,
}

/// Revocation evidence for one certificate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RevocationInfo {
    /// Subject DN of the checked certificate
    pub subject: String,
    /// Serial, uppercase hex
    pub serial: String,
    pub status: RevocationStatus,
    pub source: RevocationSource,
    /// Responder or distribution point; `None` for evidence already in the document
    pub url: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub this_update: Option<DateTime<Utc>>,
    pub next_update: Option<DateTime<Utc>>,
    pub revocation_time: Option<DateTime<Utc>>,
    pub revocation_reason: Option<u8>,
    /// Delta CRL, embedded as-is
    pub is_delta: bool,
    /// OCSPResponse or CRL, DER
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Revocation results for a chain.
#[derive(Debug, Clone, Default)]
pub struct ChainRevocation {
    /// One entry per certificate with evidence
    pub entries: Vec<RevocationInfo>,
    /// Certificates with no evidence, and why
    pub errors: Vec<String>,
}

impl ChainRevocation {
    /// Whether any certificate is revoked.
    pub fn any_revoked(&self) -> bool {
        self.entries.iter().any(|e| e.status == RevocationStatus::Revoked)
    }
}

/// Status of `cert` according to a CRL.
///
/// With `issuer` given, the CRL must be issued by it and its signature must verify.
pub fn check_crl_for_cert(crl_der: &[u8], cert: &CertificateInfo, issuer: Option<&CertificateInfo>) -> Result<RevocationStatus> {
    let crl = CrlInfo::from_der(crl_der)?;
    if let Some(issuer) = issuer {
        if !crl.is_issued_by(issuer) {
            return Err(Error::Verification(format!(
                "CRL issued by {} does not cover certificates of {}",
                crl.issuer, issuer.subject
            )));
        }
        crl.verify_signature(issuer)?;
    }
    if crl.is_delta {
        log::warn!("Delta CRL from {} checked without its base CRL", crl.issuer);
    }
    Ok(if crl.is_revoked(cert) {
        RevocationStatus::Revoked
    } else {
        RevocationStatus::Good
    })
}

/// Status of `cert` according to an OCSP response, plus the matching entry's dates.
pub fn check_ocsp_response(
    response_der: &[u8],
    cert: &CertificateInfo,
    issuer: &CertificateInfo,
    verify_signature: bool,
) -> Result<RevocationInfo> {
    let response = OcspResponse::from_der(response_der)?;
    if response.status != OcspResponseStatus::Successful {
        return Err(Error::InvalidResponse(format!("OCSP responder answered {:?}", response.status)));
    }
    let basic = response
        .basic
        .as_ref()
        .ok_or_else(|| Error::InvalidResponse("OCSP response carries no BasicOCSPResponse".to_string()))?;
    if verify_signature {
        basic.verify_signature(issuer)?;
    }
    let single = basic
        .find(cert, issuer)
        .ok_or_else(|| Error::InvalidResponse(format!("OCSP response does not cover {}", cert.subject)))?;

    let (status, revocation_time, revocation_reason) = match single.status {
        CertStatus::Good => (RevocationStatus::Good, None, None),
        CertStatus::Revoked { time, reason } => (RevocationStatus::Revoked, Some(time), reason),
        CertStatus::Unknown => (RevocationStatus::Unknown, None, None),
    };
    Ok(RevocationInfo {
        subject: cert.subject.clone(),
        serial: cert.serial_hex(),
        status,
        source: RevocationSource::Ocsp,
        url: None,
        checked_at: Utc::now(),
        this_update: Some(single.this_update),
        next_update: single.next_update,
        revocation_time,
        revocation_reason,
        is_delta: false,
        data: response_der.to_vec(),
    })
}

/// Checks certificates against their OCSP responders and CRL distribution points.
#[derive(Debug, Clone, Copy)]
pub struct RevocationChecker<'a> {
    fetcher: &'a Fetcher,
    options: &'a RevocationOptions,
}

impl<'a> RevocationChecker<'a> {
    pub fn new(fetcher: &'a Fetcher, options: &'a RevocationOptions) -> Self {
        Self { fetcher, options }
    }

    /// Revocation evidence for `cert`, or `None` if no source answered.
    ///
    /// OCSP is tried first when the certificate names a responder. When every
    /// responder fails (and CRL fallback is allowed), the first CRL that can
    /// be fetched is returned with status `Unknown`; [`check_crl_for_cert`]
    /// resolves it against the revoked entries.
    pub async fn check_revocation(&self, cert: &CertificateInfo, issuer: &CertificateInfo) -> Result<Option<RevocationInfo>> {
        let try_ocsp = self.options.prefer_ocsp || cert.crl_urls.is_empty();
        if try_ocsp && !cert.ocsp_urls.is_empty() {
            match self.query_ocsp(cert, issuer).await {
                Ok(info) => return Ok(Some(info)),
                Err(e) if self.options.allow_crl_fallback => {
                    log::debug!("OCSP failed for {}, falling back to CRL: {}", cert.subject, e);
                },
                Err(e) => {
                    log::warn!("OCSP failed for {} and CRL fallback is disabled: {}", cert.subject, e);
                    return Ok(None);
                },
            }
        }

        for url in &cert.crl_urls {
            match self.fetcher.fetch_crl(url).await {
                Ok(der) => {
                    let parsed = CrlInfo::from_der(&der).ok();
                    return Ok(Some(RevocationInfo {
                        subject: cert.subject.clone(),
                        serial: cert.serial_hex(),
                        status: RevocationStatus::Unknown,
                        source: RevocationSource::Crl,
                        url: Some(url.clone()),
                        checked_at: Utc::now(),
                        this_update: parsed.as_ref().map(|c| c.this_update),
                        next_update: parsed.as_ref().and_then(|c| c.next_update),
                        revocation_time: None,
                        revocation_reason: None,
                        is_delta: parsed.as_ref().is_some_and(|c| c.is_delta),
                        data: der,
                    }));
                },
                Err(e) => log::warn!("Could not fetch CRL {}: {}", url, e),
            }
        }

        if !self.options.prefer_ocsp && !cert.ocsp_urls.is_empty() && !cert.crl_urls.is_empty() {
            match self.query_ocsp(cert, issuer).await {
                Ok(info) => return Ok(Some(info)),
                Err(e) => log::warn!("OCSP failed for {}: {}", cert.subject, e),
            }
        }

        log::debug!("No revocation source answered for {}", cert.subject);
        Ok(None)
    }

    /// Query each OCSP responder of `cert` until one answers about it.
    pub async fn query_ocsp(&self, cert: &CertificateInfo, issuer: &CertificateInfo) -> Result<RevocationInfo> {
        let nonce = self.options.ocsp_nonce.then(|| {
            let mut bytes = [0u8; 16];
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            bytes
        });
        let request = ocsp::build_request(cert, issuer, nonce.as_ref().map(|n| n.as_slice()))?;

        let mut last_error = None;
        for url in &cert.ocsp_urls {
            let outcome = match self.fetcher.fetch_ocsp(url, &request).await {
                Ok(der) => check_ocsp_response(&der, cert, issuer, self.options.verify_signatures),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(mut info) => {
                    info.url = Some(url.clone());
                    log::debug!("OCSP {} says {:?} for {}", url, info.status, cert.subject);
                    return Ok(info);
                },
                Err(e) => {
                    log::warn!("OCSP query to {} for {} failed: {}", url, cert.subject, e);
                    last_error = Some(e);
                },
            }
        }
        Err(last_error.unwrap_or_else(|| {
            Error::InvalidResponse(format!("{} names no OCSP responder", cert.subject))
        }))
    }

    /// Check every non-root certificate of `chain` against its issuer.
    ///
    /// CRL evidence is resolved against the revoked entries here.
    pub async fn check_chain_revocation(&self, chain: &CertificateChain) -> ChainRevocation {
        let mut out = ChainRevocation::default();
        for (cert, issuer) in chain.issued_pairs() {
            match self.check_revocation(cert, issuer).await {
                Ok(Some(mut info)) => {
                    if info.source == RevocationSource::Crl {
                        let verify_with = self.options.verify_signatures.then_some(issuer);
                        match check_crl_for_cert(&info.data, cert, verify_with) {
                            Ok(status) => info.status = status,
                            Err(e) => out.errors.push(format!("{}: unusable CRL: {}", cert.subject, e)),
                        }
                    }
                    out.entries.push(info);
                },
                Ok(None) => out
                    .errors
                    .push(format!("{}: no revocation information available", cert.subject)),
                Err(e) => out.errors.push(format!("{}: {}", cert.subject, e)),
            }
        }
        out
    }
}
