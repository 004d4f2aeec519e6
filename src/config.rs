//! Configuration for timestamping, LTV enrichment and validation.
//!
//! Every struct derives `serde` with `#[serde(default)]`, so a JSON config
//! file only needs the keys it changes.

use crate::network::NetworkConfig;
use crate::signatures::PrepareOptions;
use crate::timestamp::{HashAlgorithm, RequestOptions};

/// Chain building.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    /// Maximum chain length, leaf included.
    pub max_depth: usize,

    /// Fetch missing issuers from AIA CA Issuers URLs.
    pub enable_aia_fetching: bool,

    /// DER trust anchors. When empty, any self-signed root is accepted as trusted.
    #[serde(skip)]
    pub trust_anchors: Vec<Vec<u8>>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self {
            max_depth: 10,
            enable_aia_fetching: true,
            trust_anchors: Vec::new(),
        }
    }

    /// Set the maximum chain length.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enable AIA fetching.
    pub fn with_aia_fetching(mut self, enable: bool) -> Self {
        self.enable_aia_fetching = enable;
        self
    }

    /// Add a trust anchor.
    pub fn with_trust_anchor(mut self, der: Vec<u8>) -> Self {
        self.trust_anchors.push(der);
        self
    }
}

/// Revocation checking.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RevocationOptions {
    /// Try OCSP before CRLs.
    pub prefer_ocsp: bool,

    /// Fall back to CRLs when OCSP fails.
    pub allow_crl_fallback: bool,

    /// Send a nonce in OCSP requests (defeats response caching).
    pub ocsp_nonce: bool,

    /// Check OCSP response and CRL signatures against the issuer.
    pub verify_signatures: bool,
}

impl Default for RevocationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RevocationOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self {
            prefer_ocsp: true,
            allow_crl_fallback: true,
            ocsp_nonce: false,
            verify_signatures: true,
        }
    }

    /// Enable CRL fallback.
    pub fn with_crl_fallback(mut self, enable: bool) -> Self {
        self.allow_crl_fallback = enable;
        self
    }

    /// Prefer OCSP over CRLs.
    pub fn with_prefer_ocsp(mut self, enable: bool) -> Self {
        self.prefer_ocsp = enable;
        self
    }

    /// Send OCSP nonces.
    pub fn with_ocsp_nonce(mut self, enable: bool) -> Self {
        self.ocsp_nonce = enable;
        self
    }

    /// Verify response signatures.
    pub fn with_signature_verification(mut self, enable: bool) -> Self {
        self.verify_signatures = enable;
        self
    }
}

/// Digest used for VRI dictionary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum VriKeyHash {
    /// PDF 1.x readers
    #[default]
    #[serde(rename = "SHA-1")]
    Sha1,
    /// PDF 2.0
    #[serde(rename = "SHA-256")]
    Sha256,
}

impl VriKeyHash {
    /// The digest algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            VriKeyHash::Sha1 => HashAlgorithm::Sha1,
            VriKeyHash::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

/// B-LT enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LtvOptions {
    pub chain: ChainOptions,
    pub revocation: RevocationOptions,

    /// Also write a VRI entry for the TSA certificate.
    pub vri: bool,

    /// VRI key digest.
    pub vri_key_hash: VriKeyHash,
}

impl LtvOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chain options.
    pub fn with_chain(mut self, chain: ChainOptions) -> Self {
        self.chain = chain;
        self
    }

    /// Set revocation options.
    pub fn with_revocation(mut self, revocation: RevocationOptions) -> Self {
        self.revocation = revocation;
        self
    }

    /// Write VRI entries keyed with `hash`.
    pub fn with_vri(mut self, hash: VriKeyHash) -> Self {
        self.vri = true;
        self.vri_key_hash = hash;
        self
    }
}

/// Adding a document timestamp.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TimestampOptions {
    /// Imprint algorithm.
    pub hash_algorithm: HashAlgorithm,

    /// Placeholder options. `signature_size` is raised to the LTV size when `ltv` is set and it was left at the default.
    pub prepare: PrepareOptions,

    /// TimeStampReq options.
    pub request: RequestOptions,

    /// Embed chain and revocation data for the TSA certificate (B-LT).
    pub ltv: bool,

    /// Enrichment settings used when `ltv` is set.
    pub ltv_options: LtvOptions,
}

impl Default for TimestampOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha256,
            prepare: PrepareOptions::default(),
            request: RequestOptions::default(),
            ltv: false,
            ltv_options: LtvOptions::default(),
        }
    }

    /// Set the imprint algorithm.
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Set placeholder options.
    pub fn with_prepare(mut self, prepare: PrepareOptions) -> Self {
        self.prepare = prepare;
        self
    }

    /// Set request options.
    pub fn with_request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    /// Enable B-LT enrichment.
    pub fn with_ltv(mut self, enable: bool) -> Self {
        self.ltv = enable;
        self
    }

    /// Set enrichment settings.
    pub fn with_ltv_options(mut self, options: LtvOptions) -> Self {
        self.ltv_options = options;
        self
    }

    /// Placeholder options with the LTV size applied.
    pub(crate) fn effective_prepare(&self) -> PrepareOptions {
        let mut prepare = self.prepare.clone();
        if self.ltv && prepare.signature_size == crate::signatures::DEFAULT_SIGNATURE_SIZE {
            prepare.signature_size = crate::signatures::LTV_SIGNATURE_SIZE;
        }
        prepare
    }
}

/// Validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Run the RFC 8933 algorithm-protection stage.
    pub check_rfc8933: bool,

    /// Build and check the TSA certificate chain.
    pub check_chain: bool,

    /// Check revocation of the chain (embedded DSS data first, then the network).
    pub check_revocation: bool,

    /// Allow network fetches for chain and revocation data.
    pub online: bool,

    pub chain: ChainOptions,
    pub revocation: RevocationOptions,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self {
            check_rfc8933: false,
            check_chain: true,
            check_revocation: true,
            online: true,
            chain: ChainOptions::default(),
            revocation: RevocationOptions::default(),
        }
    }

    /// Enable the RFC 8933 stage.
    pub fn with_rfc8933(mut self, enable: bool) -> Self {
        self.check_rfc8933 = enable;
        self
    }

    /// Enable chain checks.
    pub fn with_chain_check(mut self, enable: bool) -> Self {
        self.check_chain = enable;
        self
    }

    /// Enable revocation checks.
    pub fn with_revocation_check(mut self, enable: bool) -> Self {
        self.check_revocation = enable;
        self
    }

    /// Allow or forbid network access.
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Set chain options.
    pub fn with_chain(mut self, chain: ChainOptions) -> Self {
        self.chain = chain;
        self
    }
}

/// Everything the `pades-ts` binary reads from `--config`.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub timestamp: TimestampOptions,
    pub validation: ValidationOptions,
}

impl Config {
    /// Parse a JSON config.
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::error::Error::Config(format!("invalid config: {}", e)))
    }
}
