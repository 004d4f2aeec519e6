//! High-level entry points.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pades_timestamp::api::{timestamp_pdf, validate_timestamps};
//! use pades_timestamp::config::{TimestampOptions, ValidationOptions};
//! use pades_timestamp::network::Fetcher;
//!
//! let fetcher = Fetcher::reqwest(Default::default())?;
//! let pdf = std::fs::read("contract.pdf")?;
//!
//! // B-LT: timestamp, then embed chain and revocation data
//! let options = TimestampOptions::new().with_ltv(true);
//! let outcome = timestamp_pdf(&pdf, "https://freetsa.org/tsr", &options, &fetcher).await?;
//! std::fs::write("contract-ts.pdf", &outcome.bytes)?;
//!
//! for result in validate_timestamps(&outcome.bytes, &ValidationOptions::default(), Some(&fetcher)).await? {
//!     println!("{}: {}", result.field_name, result.overall_status);
//! }
//! ```
//!
//! ## Archiving (B-LTA)
//!
//! [`archive_pdf`] collects LTV data for every timestamp already in the
//! document, stores it in the DSS and then adds a new document timestamp
//! over the result.

mod timestamping;
mod validate;

pub use timestamping::{archive_pdf, timestamp_pdf, TimestampOutcome};
pub use validate::validate_timestamps;
