//! Network resilience layer.
//!
//! Every outbound call (TSA, OCSP, CRL, AIA CA Issuers) goes through
//! [`ResilientClient`]: circuit breaker check, bounded timeout, exponential
//! backoff retries. [`Fetcher`] adds per-session caches on top.

mod circuit_breaker;
mod client;
mod retry;
mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use client::{Fetcher, NetworkConfig, ResilientClient};
pub use retry::EndpointConfig;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
