//! Timestamping (B-T / B-LT) and archiving (B-LTA).

use crate::asn1::{CertificateInfo, TimestampToken};
use crate::config::{LtvOptions, TimestampOptions};
use crate::error::Result;
use crate::ltv::{add_dss, add_vri_enhanced, complete_ltv_data, ChainBuilder, LtvData};
use crate::network::Fetcher;
use crate::session::TimestampSession;
use crate::signatures::extract_timestamps;
use crate::timestamp::{TimestampInfo, TsaClient};

/// Result of [`timestamp_pdf`] or [`archive_pdf`].
#[derive(Debug, Clone)]
pub struct TimestampOutcome {
    /// The updated document
    pub bytes: Vec<u8>,
    /// TSTInfo of the new token
    pub info: TimestampInfo,
    /// DER TimeStampToken that was embedded
    pub token: Vec<u8>,
    /// Name of the new signature field
    pub field_name: String,
    /// LTV material written to the DSS by this call
    pub ltv: LtvData,
    /// Non-fatal problems met while collecting LTV material
    pub warnings: Vec<String>,
}

/// Add a document timestamp from the TSA at `tsa_url` to `pdf`.
///
/// With [`TimestampOptions::ltv`] set, the TSA certificate chain and its
/// revocation data are collected afterwards and appended as a DSS (plus a
/// VRI entry when [`LtvOptions::vri`] is set). Failing to collect LTV data
/// does not fail the call; see [`TimestampOutcome::warnings`].
///
/// # Errors
///
/// Preparation, TSA and embedding errors; see [`crate::Error`].
pub async fn timestamp_pdf(
    pdf: &[u8],
    tsa_url: &str,
    options: &TimestampOptions,
    fetcher: &Fetcher,
) -> Result<TimestampOutcome> {
    let mut session = TimestampSession::new(options.clone());
    let hash = session.prepare(pdf)?.to_vec();
    let field_name = session.prepared()?.field_name.clone();

    let issued = TsaClient::new(fetcher)
        .timestamp(tsa_url, &hash, options.hash_algorithm, &options.request)
        .await?;
    session.complete(&issued.token)?;
    let (mut bytes, info) = session.into_output()?;

    let mut ltv = LtvData::new();
    let mut warnings = Vec::new();
    if options.ltv {
        let collected = collect_for_token(&issued.token, LtvData::new(), fetcher, &options.ltv_options).await;
        warnings = collected.warnings;
        match (&collected.signer, options.ltv_options.vri) {
            (Some(signer), true) => {
                bytes = add_vri_enhanced(
                    &bytes,
                    &signer.der,
                    &collected.data,
                    options.ltv_options.vri_key_hash,
                    Some(&issued.token),
                )?;
            },
            _ if !collected.data.is_empty() => bytes = add_dss(&bytes, &collected.data)?,
            _ => log::warn!("No LTV data collected for '{}'", field_name),
        }
        ltv = collected.data;
    }

    log::info!("Added document timestamp '{}' ({} bytes)", field_name, bytes.len());
    Ok(TimestampOutcome {
        bytes,
        info,
        token: issued.token,
        field_name,
        ltv,
        warnings,
    })
}

/// Extend `pdf` to B-LTA: store LTV data for every existing timestamp, then
/// add an archive timestamp covering it.
pub async fn archive_pdf(
    pdf: &[u8],
    tsa_url: &str,
    options: &TimestampOptions,
    fetcher: &Fetcher,
) -> Result<TimestampOutcome> {
    let existing = extract_timestamps(pdf)?;
    if existing.is_empty() {
        log::warn!("Document has no timestamps to archive; adding the first one");
    }

    let mut data = LtvData::new();
    let mut warnings = Vec::new();
    let mut signers = Vec::new();
    for ts in &existing {
        let collected = collect_for_token(&ts.token, data, fetcher, &options.ltv_options).await;
        data = collected.data;
        warnings.extend(collected.warnings.into_iter().map(|w| format!("{}: {}", ts.field_name, w)));
        if let Some(signer) = collected.signer {
            signers.push((signer, &ts.token));
        }
    }

    let mut bytes = pdf.to_vec();
    if !data.is_empty() {
        bytes = add_dss(&bytes, &data)?;
    }
    if options.ltv_options.vri {
        for (signer, token) in &signers {
            bytes = add_vri_enhanced(&bytes, &signer.der, &data, options.ltv_options.vri_key_hash, Some(token))?;
        }
    }

    let mut outcome = timestamp_pdf(&bytes, tsa_url, options, fetcher).await?;
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;
    data.merge(&outcome.ltv);
    outcome.ltv = data;
    Ok(outcome)
}

struct Collected {
    data: LtvData,
    warnings: Vec<String>,
    signer: Option<CertificateInfo>,
}

/// Chain and revocation data for the TSA that issued `token_der`, added to `existing`.
async fn collect_for_token(token_der: &[u8], existing: LtvData, fetcher: &Fetcher, options: &LtvOptions) -> Collected {
    let unavailable = |data: LtvData, warning: String| Collected {
        data,
        warnings: vec![warning],
        signer: None,
    };

    let token = match TimestampToken::from_der(token_der) {
        Ok(token) => token,
        Err(e) => return unavailable(existing, format!("unreadable timestamp token: {}", e)),
    };
    let signer = match token.signer_certificate() {
        Ok(Some(cert)) => cert,
        Ok(None) => return unavailable(existing, "timestamp token carries no TSA certificate".to_string()),
        Err(e) => return unavailable(existing, format!("unreadable TSA certificate: {}", e)),
    };
    let pool: Vec<CertificateInfo> = token
        .certificates()
        .iter()
        .filter_map(|der| CertificateInfo::from_der(der).ok())
        .collect();

    let chain = match ChainBuilder::new(Some(fetcher), &options.chain).build_chain(&signer, &pool).await {
        Ok(chain) => chain,
        Err(e) => return unavailable(existing, format!("chain for {}: {}", signer.subject, e)),
    };
    let enrichment = complete_ltv_data(&chain, existing, fetcher, &options.revocation).await;
    Collected {
        data: enrichment.data,
        warnings: enrichment.warnings,
        signer: Some(signer),
    }
}
