//! PDF document timestamps.
//!
//! A document timestamp is a signature dictionary with
//! `/SubFilter /ETSI.RFC3161` whose `/Contents` holds an RFC 3161
//! TimeStampToken over the bytes named by its `/ByteRange`.
//!
//! ```text
//! prepare_pdf_for_timestamp   placeholder + ByteRange, appended incrementally
//!         ↓  digest of ByteRange spans goes to the TSA
//! embed_timestamp_token       token hex patched into the placeholder
//!         ↓
//! extract_timestamps / verify_timestamp
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-2:2020 Section 12.8 - Digital Signatures
//! - ETSI EN 319 142-1 - PAdES baseline signatures

pub mod byterange;
mod embed;
mod extract;
mod placeholder;
mod types;
mod verify;

pub use byterange::ByteRange;
pub use embed::embed_timestamp_token;
pub use extract::{extract_timestamps, signature_fields, SignatureField};
pub use placeholder::{format_pdf_date, prepare_pdf_for_timestamp};
pub use types::{
    ExtractedTimestamp, PrepareOptions, PreparedPdf, SignatureSubFilter, TimestampVerification,
    DEFAULT_SIGNATURE_SIZE, LTV_SIGNATURE_SIZE,
};
pub use verify::{verify_timestamp, verify_timestamps};
