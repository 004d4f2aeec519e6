//! Best-effort collection of LTV material for a chain.

use crate::asn1::ocsp::{self, OcspResponse};
use crate::asn1::{CertificateInfo, CrlInfo};
use crate::config::RevocationOptions;
use crate::ltv::chain::CertificateChain;
use crate::ltv::data::LtvData;
use crate::ltv::revocation::{check_ocsp_response, RevocationStatus};
use crate::network::Fetcher;

/// Enrichment output: the data gathered and what could not be gathered.
#[derive(Debug, Clone, Default)]
pub struct LtvEnrichment {
    pub data: LtvData,
    pub warnings: Vec<String>,
}

/// Add `chain`'s certificates and revocation data for each issued certificate to `existing`.
///
/// For every certificate with a distinct issuer, OCSP is tried first; a
/// response whose status is not `GOOD` is left out. When OCSP fails the first
/// CRL distribution point that answers is used. Delta CRLs are embedded as
/// they are, with a warning. Nothing here fails the call: problems end up in
/// [`LtvEnrichment::warnings`].
pub async fn complete_ltv_data(
    chain: &CertificateChain,
    existing: LtvData,
    fetcher: &Fetcher,
    options: &RevocationOptions,
) -> LtvEnrichment {
    let mut out = LtvEnrichment {
        data: existing,
        warnings: Vec::new(),
    };

    for der in chain.certificates_der() {
        out.data.add_certificate(der.to_vec());
    }
    if !chain.complete {
        out.warnings.push(format!(
            "certificate chain of {} is incomplete",
            chain.leaf().map(|c| c.subject.as_str()).unwrap_or("<empty>")
        ));
    }

    for (cert, issuer) in chain.issued_pairs() {
        match ocsp_evidence(cert, issuer, fetcher, options).await {
            Ok(Some((response, responder_certs))) => {
                if !out.data.add_ocsp_response(response) {
                    log::debug!("OCSP response for {} already collected", cert.subject);
                }
                for der in responder_certs {
                    out.data.add_certificate(der);
                }
                continue;
            },
            Ok(None) => continue,
            Err(reason) => {
                if !cert.ocsp_urls.is_empty() {
                    out.warnings.push(format!("OCSP for {}: {}", cert.subject, reason));
                }
            },
        }

        if !options.allow_crl_fallback && !cert.ocsp_urls.is_empty() {
            continue;
        }
        match crl_evidence(cert, fetcher).await {
            Ok((der, is_delta)) => {
                if is_delta {
                    out.warnings.push(format!(
                        "delta CRL for {} embedded without merging into a base CRL",
                        cert.subject
                    ));
                }
                if !out.data.add_crl(der) {
                    log::debug!("CRL for {} already collected", cert.subject);
                }
            },
            Err(reason) => out.warnings.push(format!("CRL for {}: {}", cert.subject, reason)),
        }
    }

    log::info!(
        "LTV data: {} certificate(s), {} CRL(s), {} OCSP response(s), {} warning(s)",
        out.data.certificates.len(),
        out.data.crls.len(),
        out.data.ocsp_responses.len(),
        out.warnings.len()
    );
    out
}

/// `Ok(Some)` for a GOOD response, `Ok(None)` when a response was deliberately skipped.
async fn ocsp_evidence(
    cert: &CertificateInfo,
    issuer: &CertificateInfo,
    fetcher: &Fetcher,
    options: &RevocationOptions,
) -> std::result::Result<Option<(Vec<u8>, Vec<Vec<u8>>)>, String> {
    if cert.ocsp_urls.is_empty() {
        return Err("no OCSP responder".to_string());
    }
    let request = ocsp::build_request(cert, issuer, None).map_err(|e| e.to_string())?;

    let mut last_error = String::new();
    for url in &cert.ocsp_urls {
        let der = match fetcher.fetch_ocsp(url, &request).await {
            Ok(der) => der,
            Err(e) => {
                last_error = e.to_string();
                continue;
            },
        };
        match check_ocsp_response(&der, cert, issuer, options.verify_signatures) {
            Ok(info) if info.status == RevocationStatus::Good => {
                let responder_certs = OcspResponse::from_der(&der)
                    .ok()
                    .and_then(|r| r.basic)
                    .map(|b| b.certificates)
                    .unwrap_or_default();
                return Ok(Some((der, responder_certs)));
            },
            Ok(info) => {
                log::warn!(
                    "Not embedding OCSP response from {}: status of {} is {:?}",
                    url,
                    cert.subject,
                    info.status
                );
                return Ok(None);
            },
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(last_error)
}

async fn crl_evidence(cert: &CertificateInfo, fetcher: &Fetcher) -> std::result::Result<(Vec<u8>, bool), String> {
    if cert.crl_urls.is_empty() {
        return Err("no CRL distribution point".to_string());
    }
    let mut last_error = String::new();
    for url in &cert.crl_urls {
        match fetcher.fetch_crl(url).await {
            Ok(der) => match CrlInfo::from_der(&der) {
                Ok(crl) => return Ok((der, crl.is_delta)),
                Err(e) => last_error = format!("{}: {}", url, e),
            },
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(last_error)
}
