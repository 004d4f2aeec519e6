//! Certificate chain building.
//!
//! Issuers are resolved by name within a working set of certificates, with
//! Authority/Subject Key Identifier agreement breaking ties. Certificates
//! missing from the set are fetched from AIA CA Issuers URLs, one round per
//! iteration, until no round makes progress or `max_depth` rounds have run.

use crate::asn1::CertificateInfo;
use crate::config::ChainOptions;
use crate::error::Result;
use crate::network::Fetcher;
use crate::timestamp::HashAlgorithm;

/// One certificate in a chain.
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub certificate: CertificateInfo,
    /// Self-signed and, when trust anchors are configured, one of them
    pub is_trusted: bool,
    pub is_self_signed: bool,
    /// Index of the issuer node in [`CertificateChain::nodes`]
    pub issuer: Option<usize>,
}

/// A chain from a leaf towards a root, leaf first.
#[derive(Debug, Clone, Default)]
pub struct CertificateChain {
    pub nodes: Vec<ChainNode>,
    /// A self-signed root was reached
    pub complete: bool,
    /// Index of the root node, when trusted
    pub trusted_root: Option<usize>,
}

impl CertificateChain {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf(&self) -> Option<&CertificateInfo> {
        self.nodes.first().map(|n| &n.certificate)
    }

    /// The issuer of node `index`.
    pub fn issuer_of(&self, index: usize) -> Option<&CertificateInfo> {
        let issuer = self.nodes.get(index)?.issuer?;
        self.nodes.get(issuer).map(|n| &n.certificate)
    }

    /// Nodes that have an issuer other than themselves, with that issuer.
    pub fn issued_pairs(&self) -> impl Iterator<Item = (&CertificateInfo, &CertificateInfo)> {
        self.nodes.iter().enumerate().filter_map(move |(i, node)| {
            if node.is_self_signed {
                return None;
            }
            self.issuer_of(i).map(|issuer| (&node.certificate, issuer))
        })
    }

    /// DER of every certificate, leaf first.
    pub fn certificates_der(&self) -> impl Iterator<Item = &[u8]> {
        self.nodes.iter().map(|n| n.certificate.der.as_slice())
    }

    /// Check each link's signature. Returns the first failing subject.
    pub fn verify_links(&self) -> std::result::Result<(), String> {
        for (cert, issuer) in self.issued_pairs() {
            if let Err(e) = cert.verify_issued_by(issuer) {
                return Err(format!("{} is not signed by {}: {}", cert.subject, issuer.subject, e));
            }
        }
        for node in self.nodes.iter().filter(|n| n.is_self_signed) {
            if let Err(e) = node.certificate.verify_issued_by(&node.certificate) {
                return Err(format!("root {} has an invalid self-signature: {}", node.certificate.subject, e));
            }
        }
        Ok(())
    }
}

/// Pick the issuer of `cert` among `candidates`.
///
/// Name match is required; among several, the one whose Subject Key
/// Identifier equals `cert`'s Authority Key Identifier wins, otherwise the
/// first name match.
pub fn find_issuer<'a>(cert: &CertificateInfo, candidates: &'a [CertificateInfo]) -> Option<&'a CertificateInfo> {
    let mut by_name = candidates
        .iter()
        .filter(|c| c.subject_raw == cert.issuer_raw && c.der != cert.der);
    let first = by_name.next()?;
    let Some(aki) = cert.authority_key_id.as_deref() else {
        return Some(first);
    };
    if first.subject_key_id.as_deref() == Some(aki) {
        return Some(first);
    }
    Some(
        by_name
            .find(|c| c.subject_key_id.as_deref() == Some(aki))
            .unwrap_or(first),
    )
}

/// Builds chains, fetching missing issuers when allowed.
#[derive(Debug, Clone, Copy)]
pub struct ChainBuilder<'a> {
    fetcher: Option<&'a Fetcher>,
    options: &'a ChainOptions,
}

impl<'a> ChainBuilder<'a> {
    /// A builder; without a fetcher no AIA fetching happens.
    pub fn new(fetcher: Option<&'a Fetcher>, options: &'a ChainOptions) -> Self {
        Self { fetcher, options }
    }

    /// Build the chain of `leaf` from `pool` plus whatever AIA yields.
    ///
    /// Fetch failures are logged and end that branch; they do not fail the call.
    pub async fn build_chain(&self, leaf: &CertificateInfo, pool: &[CertificateInfo]) -> Result<CertificateChain> {
        let mut set: Vec<CertificateInfo> = vec![leaf.clone()];
        for cert in pool {
            add_unique(&mut set, cert.clone());
        }

        if self.options.enable_aia_fetching {
            if let Some(fetcher) = self.fetcher {
                for round in 0..self.options.max_depth {
                    if !self.fetch_round(fetcher, &mut set).await {
                        log::debug!("AIA round {} made no progress", round + 1);
                        break;
                    }
                }
            }
        }

        Ok(self.link(set))
    }

    /// Fetch CA Issuers for every certificate whose issuer is missing. Returns whether anything was added.
    async fn fetch_round(&self, fetcher: &Fetcher, set: &mut Vec<CertificateInfo>) -> bool {
        let orphans: Vec<CertificateInfo> = set
            .iter()
            .filter(|c| !c.is_self_signed() && find_issuer(c, set).is_none())
            .cloned()
            .collect();

        let mut progress = false;
        for cert in orphans {
            for url in &cert.ca_issuer_urls {
                let der = match fetcher.fetch_ca_issuer(url).await {
                    Ok(der) => der,
                    Err(e) => {
                        log::warn!("Could not fetch issuer of {} from {}: {}", cert.subject, url, e);
                        continue;
                    },
                };
                match CertificateInfo::from_der(&der) {
                    Ok(issuer) => {
                        log::debug!("Fetched {} from {}", issuer.subject, url);
                        if add_unique(set, issuer) {
                            progress = true;
                        }
                        break;
                    },
                    Err(e) => log::warn!("{} did not return a DER certificate: {}", url, e),
                }
            }
        }
        progress
    }

    fn link(&self, set: Vec<CertificateInfo>) -> CertificateChain {
        let anchors: Vec<Vec<u8>> = self
            .options
            .trust_anchors
            .iter()
            .map(|der| HashAlgorithm::Sha256.digest(der))
            .collect();

        let mut chain = CertificateChain::default();
        let Some(mut current) = set.first().cloned() else {
            return chain;
        };

        loop {
            let index = chain.nodes.len();
            let is_self_signed = current.is_self_signed();
            let is_trusted = is_self_signed
                && (anchors.is_empty() || anchors.contains(&current.fingerprint(HashAlgorithm::Sha256)));
            chain.nodes.push(ChainNode {
                certificate: current.clone(),
                is_trusted,
                is_self_signed,
                issuer: None,
            });

            if is_self_signed {
                chain.nodes[index].issuer = Some(index);
                chain.complete = true;
                if is_trusted {
                    chain.trusted_root = Some(index);
                }
                break;
            }
            if chain.nodes.len() >= self.options.max_depth {
                log::debug!("Chain of {} stopped at max depth {}", current.subject, self.options.max_depth);
                break;
            }
            let Some(issuer) = find_issuer(&current, &set) else {
                log::debug!("No issuer found for {}", current.subject);
                break;
            };
            if chain.nodes.iter().any(|n| n.certificate.der == issuer.der) {
                log::warn!("Certificate loop detected at {}", issuer.subject);
                break;
            }
            chain.nodes[index].issuer = Some(index + 1);
            current = issuer.clone();
        }

        log::debug!(
            "Built chain of {} certificate(s), complete: {}",
            chain.nodes.len(),
            chain.complete
        );
        chain
    }
}

/// Add `cert` unless a certificate with the same issuer and serial is present.
fn add_unique(set: &mut Vec<CertificateInfo>, cert: CertificateInfo) -> bool {
    if set.iter().any(|c| c.issuer_raw == cert.issuer_raw && c.has_serial(&cert.serial)) {
        return false;
    }
    set.push(cert);
    true
}
