// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PAdES Timestamp
//!
//! RFC 3161 document timestamps for PDF, with PAdES B-LT and B-LTA
//! long-term validation data.
//!
//! ## Core Features
//!
//! - **Document timestamps**: `/SubFilter /ETSI.RFC3161` signature fields added as an
//!   incremental update; prior signatures and their ByteRanges are never touched
//! - **TSA protocol**: TimeStampReq with nonce and certReq, tolerant TimeStampResp decoding
//!   (strict schema first, positional fallback), nonce and imprint checks
//! - **Verification**: CMS signature of the token, document digest over the ByteRange,
//!   optional RFC 8933 algorithm protection
//! - **Long-term validation**: chain building over AIA, OCSP with CRL fallback,
//!   deduplicated `/DSS` and `/VRI` dictionaries
//! - **Archiving**: B-LTA archive timestamps over documents that already carry DSS data
//! - **Network resilience**: per-endpoint retries with exponential backoff and a
//!   per-URL circuit breaker
//!
//! ## Architecture
//!
//! ```text
//! api ─┬─ session ─┬─ signatures (placeholder, embed, extract, verify)
//!      │           └─ timestamp  (request, response, TSA client)
//!      ├─ ltv      (chain, revocation, enrichment, DSS/VRI)
//!      └─ validation
//!
//! signatures, ltv ── editor (incremental update) ── writer ── document/parser/xref
//! timestamp, ltv, validation ── asn1 (CMS, X.509, CRL, OCSP)
//! timestamp, ltv ── network (retry, circuit breaker, transport)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use pades_timestamp::api::timestamp_pdf;
//! use pades_timestamp::config::TimestampOptions;
//! use pades_timestamp::network::{Fetcher, NetworkConfig};
//!
//! # async fn run() -> pades_timestamp::Result<()> {
//! let fetcher = Fetcher::reqwest(NetworkConfig::default())?;
//! let pdf = std::fs::read("in.pdf")?;
//! let outcome = timestamp_pdf(&pdf, "https://freetsa.org/tsr", &TimestampOptions::default(), &fetcher).await?;
//! std::fs::write("out.pdf", outcome.bytes)?;
//! # Ok(())
//! # }
//! ```

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Object serialization and incremental updates
pub mod editor;
pub mod writer;

// ASN.1 / CMS / X.509
pub mod asn1;

// Outbound HTTP
pub mod network;

// RFC 3161 protocol
pub mod timestamp;

// Document timestamp fields
pub mod signatures;

// PAdES long-term validation data
pub mod ltv;

// Validation results and stages
pub mod validation;

// Configuration
pub mod config;

// Staged workflows
pub mod session;

// High-level API
pub mod api;

// RFC 4998 (not implemented)
pub mod ers;

// Re-exports
pub use api::{archive_pdf, timestamp_pdf, validate_timestamps, TimestampOutcome};
pub use config::{LtvOptions, TimestampOptions, ValidationOptions};
pub use document::PdfDocument;
pub use error::{Error, ErrorCode, Result};
pub use ltv::LtvData;
pub use session::{TimestampSession, ValidationSession};
pub use signatures::{
    embed_timestamp_token, extract_timestamps, prepare_pdf_for_timestamp, verify_timestamp, verify_timestamps,
    ExtractedTimestamp, PrepareOptions, PreparedPdf,
};
pub use timestamp::{HashAlgorithm, TimestampInfo};
pub use validation::{RichValidationResult, ValidationResult, ValidationStatus};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "pades_timestamp");
    }
}
