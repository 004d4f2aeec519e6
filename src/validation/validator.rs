//! Staged timestamp validation.

use crate::asn1::{CertificateInfo, CrlInfo, TimestampToken};
use crate::config::ValidationOptions;
use crate::ltv::{
    check_crl_for_cert, check_ocsp_response, ChainBuilder, LtvData, RevocationChecker, RevocationInfo,
    RevocationSource, RevocationStatus,
};
use crate::network::Fetcher;
use crate::signatures::ExtractedTimestamp;
use crate::validation::result::{RichValidationResult, ValidationCode, ValidationStage};
use chrono::Utc;

/// Runs the validation stages over one extracted timestamp.
#[derive(Debug, Clone, Copy)]
pub struct TimestampValidator<'a> {
    fetcher: Option<&'a Fetcher>,
    options: &'a ValidationOptions,
}

impl<'a> TimestampValidator<'a> {
    /// A validator; without a fetcher (or with `online` off) only embedded data is used.
    pub fn new(fetcher: Option<&'a Fetcher>, options: &'a ValidationOptions) -> Self {
        Self { fetcher, options }
    }

    fn online(&self) -> Option<&'a Fetcher> {
        self.fetcher.filter(|_| self.options.online)
    }

    /// Validate `ts` against `pdf`, using `dss` (the document's DSS) as offline evidence.
    pub async fn validate(&self, pdf: &[u8], ts: &ExtractedTimestamp, dss: &LtvData) -> RichValidationResult {
        let mut result = RichValidationResult::new(&ts.field_name);
        result.info = Some(ts.info.clone());

        // FORMAT
        let token = match TimestampToken::from_der(&ts.token) {
            Ok(token) => token,
            Err(e) => {
                result.fail(ValidationStage::Format, ValidationCode::MalformedToken, e.to_string());
                result.conclude();
                return result;
            },
        };
        if let Err(e) = ts.byte_range.spans(pdf) {
            result.fail(ValidationStage::Format, ValidationCode::MalformedToken, e.to_string());
            result.conclude();
            return result;
        }
        if ts.covers_whole_document {
            result.pass(ValidationStage::Format, "token parsed; ByteRange covers the whole document");
        } else {
            result.warn(ValidationCode::PartialCoverage);
            result.pass(
                ValidationStage::Format,
                "token parsed; the document was extended after this timestamp",
            );
        }

        // SIGNATURE
        let signer = match token.verify_signature() {
            Ok(cert) => {
                self.check_signer(&mut result, &cert, ts);
                Some(cert)
            },
            Err(e) => {
                let code = match token.signer_certificate() {
                    Ok(Some(_)) => ValidationCode::SignatureInvalid,
                    _ => ValidationCode::MissingTsaCertificate,
                };
                result.fail(ValidationStage::Signature, code, e.to_string());
                None
            },
        };

        // DOCUMENT_INTEGRITY
        let expected = ts.info.message_digest_bytes().unwrap_or_default();
        match ts.byte_range.digest(pdf, ts.info.hash_algorithm) {
            Ok(actual) if actual == expected => {
                result.pass(ValidationStage::DocumentIntegrity, "document digest matches the message imprint");
            },
            Ok(actual) => result.fail(
                ValidationStage::DocumentIntegrity,
                ValidationCode::DocumentModified,
                format!(
                    "Document hash mismatch: expected {}, computed {}",
                    ts.info.message_digest,
                    hex::encode(actual)
                ),
            ),
            Err(e) => result.fail(
                ValidationStage::DocumentIntegrity,
                ValidationCode::DocumentModified,
                format!("Document hash mismatch: {}", e),
            ),
        }

        // ALGORITHM_PROTECTION
        if self.options.check_rfc8933 {
            match token.check_algorithm_protection() {
                Ok(()) if token.has_algorithm_protection() => {
                    result.pass(ValidationStage::AlgorithmProtection, "CMSAlgorithmProtection matches the signer");
                },
                Ok(()) => {
                    result.warn(ValidationCode::AlgorithmProtectionAbsent);
                    result.pass(
                        ValidationStage::AlgorithmProtection,
                        "digest algorithm declared; no CMSAlgorithmProtection attribute",
                    );
                },
                Err(e) => result.fail(
                    ValidationStage::AlgorithmProtection,
                    ValidationCode::AlgorithmProtectionFailed,
                    e.to_string(),
                ),
            }
        }

        let Some(signer) = signer else {
            result.conclude();
            return result;
        };

        // CERTIFICATE_CHAIN
        if self.options.check_chain {
            let mut pool = Vec::new();
            for der in token.certificates().iter().map(Vec::as_slice).chain(dss.certificates.iter()) {
                match CertificateInfo::from_der(der) {
                    Ok(cert) => pool.push(cert),
                    Err(e) => log::debug!("Ignoring unparsable certificate: {}", e),
                }
            }
            let builder = ChainBuilder::new(self.online(), &self.options.chain);
            match builder.build_chain(&signer, &pool).await {
                Ok(chain) => {
                    if let Err(message) = chain.verify_links() {
                        result.fail(ValidationStage::CertificateChain, ValidationCode::ChainInvalid, message);
                    } else if !chain.complete {
                        result.undecided(
                            ValidationStage::CertificateChain,
                            ValidationCode::ChainIncomplete,
                            format!("chain of {} certificate(s) does not reach a root", chain.len()),
                        );
                    } else if chain.trusted_root.is_none() {
                        result.undecided(
                            ValidationStage::CertificateChain,
                            ValidationCode::UntrustedRoot,
                            "chain ends in a root that is not a configured trust anchor",
                        );
                    } else {
                        result.pass(
                            ValidationStage::CertificateChain,
                            format!("chain of {} certificate(s) reaches a trusted root", chain.len()),
                        );
                    }

                    if self.options.check_revocation {
                        self.check_revocation(&mut result, &chain, ts, dss).await;
                    }
                    result.chain = Some(chain);
                },
                Err(e) => result.undecided(
                    ValidationStage::CertificateChain,
                    ValidationCode::ChainIncomplete,
                    e.to_string(),
                ),
            }
        }

        result.conclude();
        log::debug!("Timestamp '{}': {}", ts.field_name, result.overall_status);
        result
    }

    fn check_signer(&self, result: &mut RichValidationResult, cert: &CertificateInfo, ts: &ExtractedTimestamp) {
        if !cert.is_valid_at(ts.info.gen_time) {
            result.fail(
                ValidationStage::Signature,
                ValidationCode::CertificateNotValidAtGenTime,
                format!(
                    "TSA certificate valid {} to {}, token generated {}",
                    cert.not_before, cert.not_after, ts.info.gen_time
                ),
            );
            return;
        }
        if !cert.has_timestamping_eku {
            result.warn(ValidationCode::MissingTimestampingEku);
        }
        result.pass(ValidationStage::Signature, format!("signed by {}", cert.subject));
    }

    async fn check_revocation(
        &self,
        result: &mut RichValidationResult,
        chain: &crate::ltv::CertificateChain,
        ts: &ExtractedTimestamp,
        dss: &LtvData,
    ) {
        let pairs: Vec<_> = chain.issued_pairs().collect();
        if pairs.is_empty() {
            result.pass(ValidationStage::Revocation, "no certificate in the chain needs a revocation check");
            return;
        }

        let mut missing = Vec::new();
        let mut revoked = Vec::new();
        for (cert, issuer) in pairs {
            match self.evidence(cert, issuer, dss).await {
                Some(info) => {
                    if info.is_delta {
                        result.warn(ValidationCode::DeltaCrl);
                    }
                    match info.status {
                        RevocationStatus::Revoked => revoked.push(match info.revocation_time {
                            Some(at) if at > ts.info.gen_time => {
                                format!("{} (revoked {}, after the timestamp)", cert.subject, at)
                            },
                            Some(at) => format!("{} (revoked {})", cert.subject, at),
                            None => cert.subject.clone(),
                        }),
                        RevocationStatus::Unknown => missing.push(cert.subject.clone()),
                        RevocationStatus::Good => {},
                    }
                    result.revocation.push(info);
                },
                None => missing.push(cert.subject.clone()),
            }
        }

        if !revoked.is_empty() {
            result.fail(
                ValidationStage::Revocation,
                ValidationCode::CertificateRevoked,
                format!("revoked: {}", revoked.join(", ")),
            );
        } else if !missing.is_empty() {
            result.undecided(
                ValidationStage::Revocation,
                ValidationCode::RevocationUnknown,
                format!("no revocation status for {}", missing.join(", ")),
            );
        } else {
            result.pass(ValidationStage::Revocation, "no certificate in the chain is revoked");
        }
    }

    /// Embedded OCSP, embedded CRLs, then the network.
    async fn evidence(&self, cert: &CertificateInfo, issuer: &CertificateInfo, dss: &LtvData) -> Option<RevocationInfo> {
        let verify = self.options.revocation.verify_signatures;

        for der in dss.ocsp_responses.iter() {
            if let Ok(info) = check_ocsp_response(der, cert, issuer, verify) {
                log::debug!("Embedded OCSP response covers {}", cert.subject);
                return Some(info);
            }
        }
        for der in dss.crls.iter() {
            let Ok(crl) = CrlInfo::from_der(der) else {
                continue;
            };
            if !crl.is_issued_by(issuer) {
                continue;
            }
            match check_crl_for_cert(der, cert, verify.then_some(issuer)) {
                Ok(status) => {
                    log::debug!("Embedded CRL covers {}", cert.subject);
                    return Some(crl_info(cert, &crl, status));
                },
                Err(e) => log::debug!("Embedded CRL unusable for {}: {}", cert.subject, e),
            }
        }

        let fetcher = self.online()?;
        let checker = RevocationChecker::new(fetcher, &self.options.revocation);
        match checker.check_revocation(cert, issuer).await {
            Ok(Some(mut info)) => {
                if info.source == RevocationSource::Crl {
                    match check_crl_for_cert(&info.data, cert, verify.then_some(issuer)) {
                        Ok(status) => info.status = status,
                        Err(e) => log::warn!("Fetched CRL unusable for {}: {}", cert.subject, e),
                    }
                }
                Some(info)
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Revocation check for {} failed: {}", cert.subject, e);
                None
            },
        }
    }
}

/// Evidence from a CRL already in the document.
fn crl_info(cert: &CertificateInfo, crl: &CrlInfo, status: RevocationStatus) -> RevocationInfo {
    RevocationInfo {
        subject: cert.subject.clone(),
        serial: cert.serial_hex(),
        status,
        source: RevocationSource::Crl,
        url: None,
        checked_at: Utc::now(),
        this_update: Some(crl.this_update),
        next_update: crl.next_update,
        revocation_time: None,
        revocation_reason: None,
        is_delta: crl.is_delta,
        data: crl.der.clone(),
    }
}
