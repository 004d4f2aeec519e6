//! Circuit-breaker protected HTTP with retries, and the fetchers built on it.

use crate::error::{Error, Result};
use crate::network::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::network::retry::EndpointConfig;
use crate::network::transport::{HttpRequest, HttpResponse, HttpTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Endpoint profiles and breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ocsp: EndpointConfig,
    pub crl: EndpointConfig,
    pub ca_issuer: EndpointConfig,
    pub tsa: EndpointConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ocsp: EndpointConfig::ocsp(),
            crl: EndpointConfig::crl(),
            ca_issuer: EndpointConfig::ca_issuer(),
            tsa: EndpointConfig::tsa(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Set the TSA endpoint profile.
    pub fn with_tsa(mut self, tsa: EndpointConfig) -> Self {
        self.tsa = tsa;
        self
    }

    /// Set the OCSP endpoint profile.
    pub fn with_ocsp(mut self, ocsp: EndpointConfig) -> Self {
        self.ocsp = ocsp;
        self
    }

    /// Set the CRL endpoint profile.
    pub fn with_crl(mut self, crl: EndpointConfig) -> Self {
        self.crl = crl;
        self
    }

    /// Set the CA issuer endpoint profile.
    pub fn with_ca_issuer(mut self, ca_issuer: EndpointConfig) -> Self {
        self.ca_issuer = ca_issuer;
        self
    }

    /// Set the breaker thresholds.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }
}

/// A transport wrapped with the shared breaker registry and retries.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    breakers: CircuitBreakerRegistry,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn HttpTransport>, breakers: CircuitBreakerRegistry) -> Self {
        Self { transport, breakers }
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Send `request` under `endpoint`'s timeout and retry policy.
    ///
    /// An open circuit fails with [`Error::CircuitOpen`] before any I/O.
    /// Transport failures, timeouts and non-2xx statuses are retried with
    /// exponential backoff; the breaker records one failure once retries are
    /// exhausted, and one success on the final successful attempt.
    pub async fn execute(&self, mut request: HttpRequest, endpoint: &EndpointConfig) -> Result<HttpResponse> {
        let url = request.url.clone();
        if !self.breakers.allow_request(&url) {
            log::debug!("Circuit open for {}, failing fast", url);
            return Err(Error::CircuitOpen(url));
        }
        request.timeout = endpoint.timeout();

        let mut last_error = None;
        for attempt in 0..endpoint.attempts() {
            if attempt > 0 {
                let delay = endpoint.backoff(attempt - 1);
                log::debug!("Retrying {} in {:?} (attempt {} of {})", url, delay, attempt + 1, endpoint.attempts());
                tokio::time::sleep(delay).await;
            }

            let outcome = match tokio::time::timeout(endpoint.timeout(), self.transport.send(&request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::network(&url, format!("timed out after {} ms", endpoint.timeout_ms))),
            };

            match outcome {
                Ok(response) if response.is_success() => {
                    self.breakers.record_success(&url);
                    return Ok(response);
                },
                Ok(response) => {
                    log::debug!("{} answered HTTP {}", url, response.status);
                    last_error = Some(Error::network(&url, format!("HTTP {}", response.status)));
                },
                Err(e) if e.is_retryable() => {
                    log::debug!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                },
                Err(e) => {
                    self.breakers.record_failure(&url);
                    return Err(e);
                },
            }
        }

        self.breakers.record_failure(&url);
        let error = last_error.unwrap_or_else(|| Error::network(&url, "no attempt was made"));
        log::warn!("Giving up on {} after {} attempts: {}", url, endpoint.attempts(), error);
        Err(match error {
            Error::Network { url, message, cause } => Error::Network {
                url,
                message: format!("{} (after {} attempts)", message, endpoint.attempts()),
                cause,
            },
            other => other,
        })
    }
}

/// OCSP, CRL, CA-issuer and TSA fetches with per-session caches.
#[derive(Debug)]
pub struct Fetcher {
    client: ResilientClient,
    config: NetworkConfig,
    ocsp_cache: Mutex<HashMap<(String, Vec<u8>), Vec<u8>>>,
    crl_cache: Mutex<HashMap<String, Vec<u8>>>,
    certificate_cache: Mutex<HashMap<String, Vec<u8>>>,
}

impl Fetcher {
    pub fn new(client: ResilientClient, config: NetworkConfig) -> Self {
        Self {
            client,
            config,
            ocsp_cache: Mutex::new(HashMap::new()),
            crl_cache: Mutex::new(HashMap::new()),
            certificate_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetcher with a fresh breaker registry configured from `config`.
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: NetworkConfig) -> Self {
        let breakers = CircuitBreakerRegistry::new(config.circuit_breaker);
        Self::new(ResilientClient::new(transport, breakers), config)
    }

    /// Fetcher over a [`ReqwestTransport`](crate::network::ReqwestTransport).
    pub fn reqwest(config: NetworkConfig) -> Result<Self> {
        let transport = crate::network::transport::ReqwestTransport::new()?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// POST an OCSP request, cached by URL and request body.
    pub async fn fetch_ocsp(&self, url: &str, request: &[u8]) -> Result<Vec<u8>> {
        let key = (url.to_string(), request.to_vec());
        if let Some(hit) = self.ocsp_cache.lock().get(&key) {
            log::debug!("OCSP cache hit for {}", url);
            return Ok(hit.clone());
        }
        let http = HttpRequest::post(url, request.to_vec(), "application/ocsp-request")
            .with_accept("application/ocsp-response");
        let body = non_empty(url, self.client.execute(http, &self.config.ocsp).await?)?;
        self.ocsp_cache.lock().insert(key, body.clone());
        Ok(body)
    }

    /// GET a CRL, cached by URL.
    pub async fn fetch_crl(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(hit) = self.crl_cache.lock().get(url) {
            log::debug!("CRL cache hit for {}", url);
            return Ok(hit.clone());
        }
        let body = non_empty(url, self.client.execute(HttpRequest::get(url), &self.config.crl).await?)?;
        self.crl_cache.lock().insert(url.to_string(), body.clone());
        Ok(body)
    }

    /// GET an AIA CA Issuers certificate, cached by URL.
    pub async fn fetch_ca_issuer(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(hit) = self.certificate_cache.lock().get(url) {
            log::debug!("Certificate cache hit for {}", url);
            return Ok(hit.clone());
        }
        let body = non_empty(url, self.client.execute(HttpRequest::get(url), &self.config.ca_issuer).await?)?;
        self.certificate_cache.lock().insert(url.to_string(), body.clone());
        Ok(body)
    }

    /// POST a TimeStampReq. Never cached: every request carries a fresh nonce.
    pub async fn request_timestamp(&self, url: &str, request: &[u8]) -> Result<Vec<u8>> {
        let http = HttpRequest::post(url, request.to_vec(), "application/timestamp-query")
            .with_accept("application/timestamp-reply");
        let response = self.client.execute(http, &self.config.tsa).await?;
        match response.content_type.as_deref() {
            Some(ct) if ct.starts_with("application/timestamp-reply") => {},
            other => log::debug!("TSA {} answered with content type {:?}", url, other),
        }
        non_empty(url, response)
    }
}

fn non_empty(url: &str, response: HttpResponse) -> Result<Vec<u8>> {
    if response.body.is_empty() {
        return Err(Error::InvalidResponse(format!("empty response body from {}", url)));
    }
    Ok(response.body)
}
