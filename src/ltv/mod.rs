//! Long-term validation material (PAdES B-LT / B-LTA).
//!
//! ```text
//! ChainBuilder::build_chain      leaf → issuers (pool, then AIA)
//!         ↓
//! complete_ltv_data              OCSP first, CRL fallback, dedup, warnings
//!         ↓
//! add_dss / add_vri_enhanced     incremental /DSS and /VRI
//! ```

mod chain;
mod data;
mod dss;
mod enrich;
mod revocation;

pub use chain::{find_issuer, CertificateChain, ChainBuilder, ChainNode};
pub use data::{DerSet, LtvData};
pub use dss::{add_dss, add_vri_enhanced, read_dss, vri_key};
pub use enrich::{complete_ltv_data, LtvEnrichment};
pub use revocation::{
    check_crl_for_cert, check_ocsp_response, ChainRevocation, RevocationChecker, RevocationInfo, RevocationSource,
    RevocationStatus,
};
