//! Per-endpoint timeout and retry settings.

use std::time::Duration;

/// Timeout and retry policy for one kind of endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Bound on one attempt, in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further retry
    pub initial_backoff_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::ocsp()
    }
}

impl EndpointConfig {
    /// OCSP responders: 10 s, 3 retries, 500 ms.
    pub fn ocsp() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }

    /// CRL distribution points: 15 s, 2 retries, 1 s. CRLs can be large.
    pub fn crl() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            initial_backoff_ms: 1_000,
        }
    }

    /// AIA CA Issuers: 10 s, 2 retries, 500 ms.
    pub fn ca_issuer() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            initial_backoff_ms: 500,
        }
    }

    /// Time-stamp authorities: 30 s, 3 retries, 1 s.
    pub fn tsa() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            initial_backoff_ms: 1_000,
        }
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the retry count.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial backoff.
    pub fn with_initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay after failed attempt `attempt` (0-based): `initial * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = EndpointConfig::ocsp();
        assert_eq!(config.backoff(0), Duration::from_millis(500));
        assert_eq!(config.backoff(1), Duration::from_millis(1000));
        assert_eq!(config.backoff(2), Duration::from_millis(2000));
        assert_eq!(config.attempts(), 4);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(EndpointConfig::crl().timeout(), Duration::from_secs(15));
        assert_eq!(EndpointConfig::crl().max_retries, 2);
        assert_eq!(EndpointConfig::ca_issuer().initial_backoff_ms, 500);
        assert_eq!(EndpointConfig::tsa().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = EndpointConfig::ocsp().with_initial_backoff_ms(u64::MAX / 2);
        assert!(config.backoff(63) >= config.backoff(1));
    }
}
