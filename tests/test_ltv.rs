//! Tests for long-term validation data: chain building, revocation data
//! collection, DSS/VRI writing and B-LTA archiving.

mod common;

use common::{
    count, fetcher, honest_transport, minimal_pdf, Embedded, Route, StubTransport, TestPki, TestTsa, TsaMode,
    TsaProfile, CA_ISSUER_URL, CRL_URL, OCSP_URL, TSA_URL,
};
use pades_timestamp::asn1::CertificateInfo;
use pades_timestamp::config::{ChainOptions, LtvOptions, RevocationOptions, VriKeyHash};
use pades_timestamp::ltv::{
    add_dss, check_crl_for_cert, complete_ltv_data, read_dss, vri_key, ChainBuilder, LtvData, RevocationChecker,
    RevocationSource, RevocationStatus,
};
use pades_timestamp::signatures::extract_timestamps;
use pades_timestamp::{archive_pdf, timestamp_pdf, HashAlgorithm, TimestampOptions};
use std::sync::Arc;

fn certs(pki: &TestPki) -> (CertificateInfo, CertificateInfo) {
    (
        CertificateInfo::from_der(&pki.tsa.der).unwrap(),
        CertificateInfo::from_der(&pki.root.der).unwrap(),
    )
}

#[test]
fn test_test_pki_extensions() {
    let pki = TestPki::with_profile(TsaProfile {
        ca_issuer: true,
        ..TsaProfile::default()
    });
    let (tsa, root) = certs(&pki);

    assert!(root.is_self_signed());
    assert!(root.is_ca);
    assert!(!tsa.is_self_signed());
    assert!(tsa.has_timestamping_eku);
    assert!(tsa.eku_critical);
    assert_eq!(tsa.crl_urls, vec![CRL_URL.to_string()]);
    assert_eq!(tsa.ca_issuer_urls, vec![CA_ISSUER_URL.to_string()]);
    assert!(tsa.ocsp_urls.is_empty());
    tsa.verify_issued_by(&root).unwrap();
}

#[tokio::test]
async fn test_chain_from_pool() {
    let pki = TestPki::new();
    let (tsa, root) = certs(&pki);
    let options = ChainOptions::default();

    let chain = ChainBuilder::new(None, &options)
        .build_chain(&tsa, &[tsa.clone(), root.clone(), root.clone()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert!(chain.complete);
    assert_eq!(chain.trusted_root, Some(1));
    assert!(chain.verify_links().is_ok());

    let pairs: Vec<_> = chain.issued_pairs().collect();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0.subject, tsa.subject);
    assert_eq!(pairs[0].1.subject, root.subject);
}

#[tokio::test]
async fn test_chain_completed_through_aia() {
    let pki = TestPki::with_profile(TsaProfile {
        ca_issuer: true,
        ..TsaProfile::default()
    });
    let (tsa, _) = certs(&pki);
    let transport = Arc::new(StubTransport::new().route(CA_ISSUER_URL, Route::Body(pki.root.der.clone())));
    let fetcher = fetcher(Arc::clone(&transport));

    let options = ChainOptions::default();
    let chain = ChainBuilder::new(Some(&fetcher), &options).build_chain(&tsa, &[]).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert!(chain.complete);
    assert_eq!(transport.calls(CA_ISSUER_URL), 1);

    let offline = options.clone().with_aia_fetching(false);
    let chain = ChainBuilder::new(Some(&fetcher), &offline).build_chain(&tsa, &[]).await.unwrap();
    assert_eq!(chain.len(), 1);
    assert!(!chain.complete);
}

#[tokio::test]
async fn test_trust_anchor_mismatch() {
    let pki = TestPki::new();
    let (tsa, root) = certs(&pki);
    let options = ChainOptions::default().with_trust_anchor(b"some other root".to_vec());

    let chain = ChainBuilder::new(None, &options).build_chain(&tsa, &[root]).await.unwrap();
    assert!(chain.complete);
    assert_eq!(chain.trusted_root, None);
}

#[tokio::test]
async fn test_collection_deduplicates() {
    let tsa = Arc::new(TestTsa::new());
    let transport = Arc::new(honest_transport(&tsa));
    let fetcher = fetcher(Arc::clone(&transport));
    let (leaf, root) = certs(&tsa.pki);
    let options = ChainOptions::default();
    let chain = ChainBuilder::new(None, &options).build_chain(&leaf, &[root]).await.unwrap();

    let first = complete_ltv_data(&chain, LtvData::new(), &fetcher, &RevocationOptions::default()).await;
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);
    assert_eq!(first.data.certificates.len(), 2);
    assert_eq!(first.data.crls.len(), 1);
    assert!(first.data.ocsp_responses.is_empty());

    // Same chain again on top of the first result
    let second = complete_ltv_data(&chain, first.data.clone(), &fetcher, &RevocationOptions::default()).await;
    assert_eq!(second.data.certificates.len(), 2);
    assert_eq!(second.data.crls.len(), 1);
    // Served from the fetcher's cache
    assert_eq!(transport.calls(CRL_URL), 1);
}

#[tokio::test]
async fn test_collection_reports_delta_crl() {
    let tsa = Arc::new(TestTsa::new());
    let transport = StubTransport::new().route(CRL_URL, Route::Body(tsa.pki.crl(&[], true)));
    let fetcher = fetcher(Arc::new(transport));
    let (leaf, root) = certs(&tsa.pki);
    let options = ChainOptions::default();
    let chain = ChainBuilder::new(None, &options).build_chain(&leaf, &[root]).await.unwrap();

    let out = complete_ltv_data(&chain, LtvData::new(), &fetcher, &RevocationOptions::default()).await;
    assert_eq!(out.data.crls.len(), 1);
    assert!(out.warnings.iter().any(|w| w.contains("delta CRL")), "{:?}", out.warnings);
}

#[tokio::test]
async fn test_collection_failure_is_a_warning() {
    let tsa = Arc::new(TestTsa::new());
    let fetcher = fetcher(Arc::new(StubTransport::new()));
    let (leaf, root) = certs(&tsa.pki);
    let options = ChainOptions::default();
    let chain = ChainBuilder::new(None, &options).build_chain(&leaf, &[root]).await.unwrap();

    let out = complete_ltv_data(&chain, LtvData::new(), &fetcher, &RevocationOptions::default()).await;
    assert_eq!(out.data.certificates.len(), 2);
    assert!(out.data.crls.is_empty());
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].starts_with("CRL for"));
}

#[test]
fn test_crl_entry_scan() {
    let pki = TestPki::new();
    let (tsa, root) = certs(&pki);

    assert_eq!(check_crl_for_cert(&pki.crl(&[], false), &tsa, Some(&root)).unwrap(), RevocationStatus::Good);
    assert_eq!(
        check_crl_for_cert(&pki.crl(&[pki.tsa.serial], false), &tsa, Some(&root)).unwrap(),
        RevocationStatus::Revoked
    );
    // Signed by the root, so the TSA cannot vouch for it
    assert!(check_crl_for_cert(&pki.crl(&[], false), &tsa, Some(&tsa)).is_err());
}

#[tokio::test]
async fn test_revocation_checker_uses_crl() {
    let tsa = Arc::new(TestTsa::new());
    let transport = StubTransport::new().route(CRL_URL, Route::Body(tsa.pki.crl(&[tsa.pki.tsa.serial], false)));
    let fetcher = fetcher(Arc::new(transport));
    let (leaf, root) = certs(&tsa.pki);
    let options = RevocationOptions::default();
    let checker = RevocationChecker::new(&fetcher, &options);

    // Single check leaves CRL evidence unresolved
    let info = checker.check_revocation(&leaf, &root).await.unwrap().unwrap();
    assert_eq!(info.source, RevocationSource::Crl);
    assert_eq!(info.status, RevocationStatus::Unknown);
    assert_eq!(info.url.as_deref(), Some(CRL_URL));

    let chain_options = ChainOptions::default();
    let chain = ChainBuilder::new(None, &chain_options).build_chain(&leaf, &[root]).await.unwrap();
    let checked = checker.check_chain_revocation(&chain).await;
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    assert_eq!(checked.entries.len(), 1);
    assert!(checked.any_revoked());
}

#[tokio::test]
async fn test_revocation_checker_without_sources() {
    let pki = TestPki::with_profile(TsaProfile {
        crl_distribution_point: false,
        ..TsaProfile::default()
    });
    let (leaf, root) = certs(&pki);
    let fetcher = fetcher(Arc::new(StubTransport::new()));
    let options = RevocationOptions::default();

    let info = RevocationChecker::new(&fetcher, &options).check_revocation(&leaf, &root).await.unwrap();
    assert!(info.is_none());
}

#[tokio::test]
async fn test_ocsp_failure_without_crl_fallback() {
    let pki = TestPki::with_profile(TsaProfile {
        ocsp_responder: true,
        ..TsaProfile::default()
    });
    let (leaf, root) = certs(&pki);
    assert_eq!(leaf.ocsp_urls, vec![OCSP_URL.to_string()]);

    // Responder unreachable, CRL served
    let transport = Arc::new(StubTransport::new().route(CRL_URL, Route::Body(pki.crl(&[], false))));
    let fetcher = fetcher(transport.clone());

    let strict = RevocationOptions::default().with_prefer_ocsp(true).with_crl_fallback(false);
    let info = RevocationChecker::new(&fetcher, &strict).check_revocation(&leaf, &root).await.unwrap();
    assert!(info.is_none());
    assert_eq!(transport.calls(CRL_URL), 0);
    assert_eq!(transport.calls(OCSP_URL), 1);

    let lenient = RevocationOptions::default().with_prefer_ocsp(true).with_crl_fallback(true);
    let info = RevocationChecker::new(&fetcher, &lenient).check_revocation(&leaf, &root).await.unwrap().unwrap();
    assert_eq!(info.source, RevocationSource::Crl);
}

#[tokio::test]
async fn test_ocsp_after_failed_crl_is_not_an_error() {
    let pki = TestPki::with_profile(TsaProfile {
        ocsp_responder: true,
        ..TsaProfile::default()
    });
    let (leaf, root) = certs(&pki);
    let fetcher = fetcher(Arc::new(StubTransport::new()));
    let options = RevocationOptions::default().with_prefer_ocsp(false);

    let info = RevocationChecker::new(&fetcher, &options).check_revocation(&leaf, &root).await.unwrap();
    assert!(info.is_none());
}

#[test]
fn test_dss_round_trip_and_merge() {
    let pki = TestPki::new();
    let crl = pki.crl(&[], false);

    let mut data = LtvData::new();
    data.add_certificate(pki.tsa.der.clone());
    data.add_certificate(pki.root.der.clone());
    data.add_crl(crl.clone());

    let pdf = minimal_pdf();
    let with_dss = add_dss(&pdf, &data).unwrap();
    assert!(with_dss.starts_with(&pdf));

    let read = read_dss(&with_dss).unwrap();
    assert_eq!(read.certificates.len(), 2);
    assert!(read.certificates.contains(&pki.root.der));
    assert!(read.crls.contains(&crl));

    // A second update with overlapping data keeps one copy of each
    let mut more = LtvData::new();
    more.add_certificate(pki.root.der.clone());
    more.add_crl(pki.crl(&[2], false));
    let merged = read_dss(&add_dss(&with_dss, &more).unwrap()).unwrap();
    assert_eq!(merged.certificates.len(), 2);
    assert_eq!(merged.crls.len(), 2);
}

#[test]
fn test_plain_pdf_has_empty_dss() {
    assert!(read_dss(&minimal_pdf()).unwrap().is_empty());
}

#[tokio::test]
async fn test_timestamp_with_ltv_and_vri() {
    let tsa = Arc::new(TestTsa::new());
    let fetcher = fetcher(Arc::new(honest_transport(&tsa)));
    let options = TimestampOptions::default()
        .with_ltv(true)
        .with_ltv_options(LtvOptions::new().with_vri(VriKeyHash::Sha256));

    let outcome = timestamp_pdf(&minimal_pdf(), TSA_URL, &options, &fetcher).await.unwrap();
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(outcome.ltv.certificates.len(), 2);
    assert_eq!(outcome.ltv.crls.len(), 1);

    let dss = read_dss(&outcome.bytes).unwrap();
    assert_eq!(dss.certificates.len(), 2);
    assert_eq!(dss.crls.len(), 1);

    let key = vri_key(&tsa.pki.tsa.der, VriKeyHash::Sha256);
    assert_eq!(key.len(), 64);
    assert!(count(&outcome.bytes, format!("/{}", key).as_bytes()) >= 1);
    assert!(count(&outcome.bytes, b"/VRI") >= 1);

    // The DSS is appended after the timestamp, so it is not covered by it
    let ts = &extract_timestamps(&outcome.bytes).unwrap()[0];
    assert!(!ts.covers_whole_document);
    assert_eq!(ts.info.hash_algorithm, HashAlgorithm::Sha256);
}

#[tokio::test]
async fn test_ltv_without_certificate_warns() {
    let tsa = Arc::new(TestTsa::new().embedded(Embedded::None));
    let transport = StubTransport::new().route(TSA_URL, Route::Tsa(Arc::clone(&tsa), TsaMode::Honest));
    let fetcher = fetcher(Arc::new(transport));
    let options = TimestampOptions::default().with_ltv(true);

    let outcome = timestamp_pdf(&minimal_pdf(), TSA_URL, &options, &fetcher).await.unwrap();
    assert!(outcome.ltv.is_empty());
    assert_eq!(outcome.warnings, vec!["timestamp token carries no TSA certificate".to_string()]);
    assert!(read_dss(&outcome.bytes).unwrap().is_empty());
}

#[tokio::test]
async fn test_archive_covers_earlier_timestamp_and_dss() {
    let tsa = Arc::new(TestTsa::new());
    let fetcher = fetcher(Arc::new(honest_transport(&tsa)));

    let first = timestamp_pdf(&minimal_pdf(), TSA_URL, &TimestampOptions::default(), &fetcher)
        .await
        .unwrap();
    let archived = archive_pdf(&first.bytes, TSA_URL, &TimestampOptions::default(), &fetcher)
        .await
        .unwrap();
    assert!(archived.bytes.starts_with(&first.bytes));
    assert_eq!(archived.field_name, "Timestamp2");
    assert_eq!(archived.ltv.crls.len(), 1);

    let timestamps = extract_timestamps(&archived.bytes).unwrap();
    assert_eq!(timestamps.len(), 2);
    assert!(!timestamps[0].covers_whole_document);
    assert!(timestamps[1].covers_whole_document);

    // The DSS written for the first timestamp lies inside the archive timestamp's range
    let dss = read_dss(&archived.bytes).unwrap();
    assert_eq!(dss.certificates.len(), 2);
    assert_eq!(dss.crls.len(), 1);
    let dss_offset = archived.bytes.windows(5).position(|w| w == b"/DSS ").unwrap();
    assert!(dss_offset > first.bytes.len());
    assert!(dss_offset < timestamps[1].byte_range.0[1]);
}
