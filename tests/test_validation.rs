//! Tests for staged timestamp validation: integrity, RFC 8933, chain and
//! revocation outcomes, and the validation session.

mod common;

use common::{fetcher, honest_transport, minimal_pdf, Embedded, Protection, TestPki, TestTsa, TSA_URL};
use pades_timestamp::config::ChainOptions;
use pades_timestamp::ltv::{add_dss, read_dss, LtvData};
use pades_timestamp::validation::{TimestampValidator, ValidationCode, ValidationStage};
use pades_timestamp::{
    extract_timestamps, timestamp_pdf, validate_timestamps, ErrorCode, HashAlgorithm, RichValidationResult,
    TimestampOptions, TimestampSession, ValidationOptions, ValidationSession, ValidationStatus,
};
use std::sync::Arc;

fn timestamped(tsa: &TestTsa) -> Vec<u8> {
    let mut session = TimestampSession::new(TimestampOptions::default());
    let hash = session.prepare(&minimal_pdf()).unwrap().to_vec();
    session.complete(&tsa.mint(&hash, HashAlgorithm::Sha256, None)).unwrap();
    session.into_output().unwrap().0
}

/// Append a DSS with both certificates of `pki` and `crl`.
fn with_dss(pdf: &[u8], pki: &TestPki, crl: Vec<u8>) -> Vec<u8> {
    let mut data = LtvData::new();
    data.add_certificate(pki.tsa.der.clone());
    data.add_certificate(pki.root.der.clone());
    data.add_crl(crl);
    add_dss(pdf, &data).unwrap()
}

async fn validate_offline(pdf: &[u8], options: &ValidationOptions) -> RichValidationResult {
    let mut results = validate_timestamps(pdf, options, None).await.unwrap();
    assert_eq!(results.len(), 1);
    results.remove(0)
}

#[tokio::test]
async fn test_offline_without_revocation_data_is_indeterminate() {
    let pdf = timestamped(&TestTsa::new());
    let result = validate_offline(&pdf, &ValidationOptions::default()).await;

    assert_eq!(result.overall_status, ValidationStatus::Indeterminate);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.warnings.contains(&ValidationCode::RevocationUnknown));
    assert_eq!(
        result.stage(ValidationStage::DocumentIntegrity).unwrap().status,
        ValidationStatus::Valid
    );
    assert_eq!(result.chain.as_ref().unwrap().len(), 2);
}

#[tokio::test]
async fn test_embedded_crl_makes_it_valid() {
    let tsa = TestTsa::new();
    let pdf = with_dss(&timestamped(&tsa), &tsa.pki, tsa.pki.crl(&[], false));
    let result = validate_offline(&pdf, &ValidationOptions::default()).await;

    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
    assert!(result.is_valid());
    // The DSS came after the timestamp
    assert!(result.warnings.contains(&ValidationCode::PartialCoverage));
    assert_eq!(result.revocation.len(), 1);
    assert_eq!(
        result.stage(ValidationStage::Revocation).unwrap().status,
        ValidationStatus::Valid
    );

    let summary = result.summary();
    assert_eq!(summary.field_name, "Timestamp1");
    assert!(summary.is_valid());
}

#[tokio::test]
async fn test_revocation_check_can_be_disabled() {
    let pdf = timestamped(&TestTsa::new());
    let options = ValidationOptions::default().with_revocation_check(false);
    let result = validate_offline(&pdf, &options).await;

    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
    assert!(result.stage(ValidationStage::Revocation).is_none());
}

#[tokio::test]
async fn test_revoked_tsa_certificate_is_invalid() {
    let tsa = TestTsa::new();
    let revoked = tsa.pki.crl(&[tsa.pki.tsa.serial], false);
    let pdf = with_dss(&timestamped(&tsa), &tsa.pki, revoked);
    let result = validate_offline(&pdf, &ValidationOptions::default()).await;

    assert_eq!(result.overall_status, ValidationStatus::Invalid);
    assert_eq!(result.errors, vec![ValidationCode::CertificateRevoked]);
    let detail = result.stage(ValidationStage::Revocation).unwrap();
    assert!(detail.message.contains("PAdES Test TSA"), "{}", detail.message);
}

#[tokio::test]
async fn test_embedded_delta_crl_warns() {
    let tsa = TestTsa::new();
    let pdf = with_dss(&timestamped(&tsa), &tsa.pki, tsa.pki.crl(&[], true));
    let result = validate_offline(&pdf, &ValidationOptions::default()).await;

    assert!(result.warnings.contains(&ValidationCode::DeltaCrl));
    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
}

#[tokio::test]
async fn test_tampered_document_is_invalid() {
    let tsa = TestTsa::new();
    let pdf = timestamped(&tsa);
    let ts = extract_timestamps(&pdf).unwrap().remove(0);
    let mut tampered = pdf.clone();
    tampered[20] ^= 0x01;

    let options = ValidationOptions::default().with_revocation_check(false);
    let result = TimestampValidator::new(None, &options)
        .validate(&tampered, &ts, &LtvData::new())
        .await;

    assert_eq!(result.overall_status, ValidationStatus::Invalid);
    assert_eq!(result.errors, vec![ValidationCode::DocumentModified]);
    let detail = result.stage(ValidationStage::DocumentIntegrity).unwrap();
    assert!(detail.message.starts_with("Document hash mismatch"));
    // Signature still checks out on its own
    assert_eq!(
        result.stage(ValidationStage::Signature).unwrap().status,
        ValidationStatus::Valid
    );
}

#[tokio::test]
async fn test_algorithm_protection() {
    let options = ValidationOptions::default().with_revocation_check(false).with_rfc8933(true);

    let matching = timestamped(&TestTsa::new().protection(Protection::Matching));
    let result = validate_offline(&matching, &options).await;
    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
    assert!(!result.warnings.contains(&ValidationCode::AlgorithmProtectionAbsent));

    let mismatched = timestamped(&TestTsa::new().protection(Protection::Mismatched));
    let result = validate_offline(&mismatched, &options).await;
    assert_eq!(result.overall_status, ValidationStatus::Invalid);
    assert!(result.errors.contains(&ValidationCode::AlgorithmProtectionFailed));

    let absent = timestamped(&TestTsa::new());
    let result = validate_offline(&absent, &options).await;
    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
    assert!(result.warnings.contains(&ValidationCode::AlgorithmProtectionAbsent));
}

#[tokio::test]
async fn test_algorithm_protection_is_opt_in() {
    let mismatched = timestamped(&TestTsa::new().protection(Protection::Mismatched));
    let options = ValidationOptions::default().with_revocation_check(false);
    let result = validate_offline(&mismatched, &options).await;

    assert!(result.stage(ValidationStage::AlgorithmProtection).is_none());
    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
}

#[tokio::test]
async fn test_chain_outcomes() {
    let options = ValidationOptions::default().with_revocation_check(false);

    // Root neither embedded nor fetchable
    let pdf = timestamped(&TestTsa::new().embedded(Embedded::Tsa));
    let result = validate_offline(&pdf, &options).await;
    assert_eq!(result.overall_status, ValidationStatus::Indeterminate);
    assert!(result.warnings.contains(&ValidationCode::ChainIncomplete));

    // Root present but not a configured anchor
    let pdf = timestamped(&TestTsa::new());
    let anchored = options
        .clone()
        .with_chain(ChainOptions::default().with_trust_anchor(b"another root".to_vec()));
    let result = validate_offline(&pdf, &anchored).await;
    assert_eq!(result.overall_status, ValidationStatus::Indeterminate);
    assert!(result.warnings.contains(&ValidationCode::UntrustedRoot));

    // Root configured as the anchor
    let pki = TestPki::new();
    let trusted = options
        .clone()
        .with_chain(ChainOptions::default().with_trust_anchor(pki.root.der.clone()));
    let result = validate_offline(&pdf, &trusted).await;
    assert_eq!(result.overall_status, ValidationStatus::Valid, "{:?}", result.details);
}

#[tokio::test]
async fn test_missing_certificate_is_invalid() {
    let pdf = timestamped(&TestTsa::new().embedded(Embedded::None));
    let result = validate_offline(&pdf, &ValidationOptions::default()).await;

    assert_eq!(result.overall_status, ValidationStatus::Invalid);
    assert!(result.errors.contains(&ValidationCode::MissingTsaCertificate));
    assert!(result.chain.is_none());
}

#[tokio::test]
async fn test_online_validation_fetches_crl() {
    let tsa = Arc::new(TestTsa::new());
    let fetcher = fetcher(Arc::new(honest_transport(&tsa)));
    let outcome = timestamp_pdf(&minimal_pdf(), TSA_URL, &TimestampOptions::default(), &fetcher)
        .await
        .unwrap();

    let results = validate_timestamps(&outcome.bytes, &ValidationOptions::default(), Some(&fetcher))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].overall_status, ValidationStatus::Valid, "{:?}", results[0].details);
    assert!(results[0].revocation[0].url.is_some());

    // The same document offline has nothing to go on
    let offline = ValidationOptions::default().with_online(false);
    let results = validate_timestamps(&outcome.bytes, &offline, Some(&fetcher)).await.unwrap();
    assert_eq!(results[0].overall_status, ValidationStatus::Indeterminate);
}

#[tokio::test]
async fn test_validation_session_order() {
    let tsa = TestTsa::new();
    let pdf = with_dss(&timestamped(&tsa), &tsa.pki, tsa.pki.crl(&[], false));
    let mut session = ValidationSession::new(ValidationOptions::default());

    assert_eq!(session.finish().unwrap_err().code(), ErrorCode::InvalidState);
    assert_eq!(session.validate_all(None).await.unwrap_err().code(), ErrorCode::InvalidState);

    assert_eq!(session.start(&pdf).unwrap(), 1);
    assert_eq!(session.start(&pdf).unwrap_err().code(), ErrorCode::InvalidState);
    assert_eq!(session.timestamps().unwrap()[0].field_name, "Timestamp1");
    assert!(session.results().is_err());

    assert_eq!(session.validate_all(None).await.unwrap().len(), 1);
    let results = session.finish().unwrap();
    assert!(results[0].is_valid());
    assert!(session.results().unwrap()[0].is_valid());
    assert_eq!(read_dss(&pdf).unwrap().crls.len(), 1);
}

#[tokio::test]
async fn test_every_timestamp_is_reported() {
    let tsa = TestTsa::new();
    let once = timestamped(&tsa);
    let mut session = TimestampSession::new(TimestampOptions::default());
    let hash = session.prepare(&once).unwrap().to_vec();
    session.complete(&tsa.mint(&hash, HashAlgorithm::Sha256, None)).unwrap();
    let twice = session.into_output().unwrap().0;

    let options = ValidationOptions::default().with_revocation_check(false);
    let results = validate_timestamps(&twice, &options, None).await.unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.field_name.as_str()).collect();
    assert_eq!(names, vec!["Timestamp1", "Timestamp2"]);
    assert!(results[0].warnings.contains(&ValidationCode::PartialCoverage));
    assert!(!results[1].warnings.contains(&ValidationCode::PartialCoverage));
    assert!(results.iter().all(|r| r.overall_status == ValidationStatus::Valid));
}
