//! Per-endpoint circuit breakers.
//!
//! ```text
//! CLOSED --[threshold consecutive failures]--> OPEN
//! OPEN --[reset timeout elapsed]--> HALF_OPEN
//! HALF_OPEN --[success]--> CLOSED
//! HALF_OPEN --[failure]--> OPEN
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time an open circuit waits before allowing a trial request, in milliseconds
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the reset timeout.
    pub fn with_reset_timeout_ms(mut self, ms: u64) -> Self {
        self.reset_timeout_ms = ms;
        self
    }

    fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// State of one endpoint's breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
        }
    }
}

impl CircuitBreaker {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Whether a call may proceed, moving OPEN to HALF_OPEN once the timeout has elapsed.
    fn allow(&mut self, config: &CircuitBreakerConfig, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or(Duration::MAX);
                if elapsed >= config.reset_timeout() {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            },
        }
    }

    fn on_success(&mut self) {
        self.success_count = self.success_count.saturating_add(1);
        self.failure_count = 0;
        self.state = CircuitState::Closed;
    }

    fn on_failure(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.success_count = 0;
        self.last_failure = Some(now);
        if self.state == CircuitState::HalfOpen || self.failure_count >= config.failure_threshold {
            self.state = CircuitState::Open;
        }
    }
}

/// Breakers keyed by URL, shared by every fetcher holding a clone.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Arc<Mutex<HashMap<String, CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call to `url` may go out now.
    pub fn allow_request(&self, url: &str) -> bool {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(url.to_string()).or_default();
        let before = breaker.state;
        let allowed = breaker.allow(&self.config, Instant::now());
        if before == CircuitState::Open && breaker.state == CircuitState::HalfOpen {
            log::info!("Circuit for {} is half-open, allowing a trial request", url);
        }
        allowed
    }

    pub fn record_success(&self, url: &str) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(url.to_string()).or_default();
        if breaker.state != CircuitState::Closed {
            log::info!("Circuit for {} closed after successful request", url);
        }
        breaker.on_success();
    }

    pub fn record_failure(&self, url: &str) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(url.to_string()).or_default();
        let before = breaker.state;
        breaker.on_failure(&self.config, Instant::now());
        if before != CircuitState::Open && breaker.state == CircuitState::Open {
            log::warn!(
                "Circuit for {} opened after {} consecutive failures",
                url,
                breaker.failure_count
            );
        }
    }

    /// Snapshot of the breaker for `url`.
    pub fn breaker(&self, url: &str) -> Option<CircuitBreaker> {
        self.breakers.lock().get(url).cloned()
    }

    /// State for `url` (CLOSED when never used).
    pub fn state(&self, url: &str) -> CircuitState {
        self.breaker(url).map(|b| b.state).unwrap_or(CircuitState::Closed)
    }

    /// Forget one endpoint.
    pub fn reset(&self, url: &str) {
        self.breakers.lock().remove(url);
    }

    /// Forget every endpoint.
    pub fn reset_all(&self) {
        self.breakers.lock().clear();
    }
}
