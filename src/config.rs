//! Engine configuration.
//!
//! [`EngineConfig`] carries the retry, timeout, and throttling knobs for the
//! operational graph. Defaults match the upstream provider's tolerances;
//! hosts override through the `with_*` builders or environment variables
//! (resolved once via `dotenvy`, mirroring `RELAYGRAPH_*` keys).

use std::time::Duration;

use crate::graph::RateLimit;

/// Tunables for one [`OperationalGraph`](crate::graph::OperationalGraph).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// First-retry backoff base. Delay for retry `n` is
    /// `min(retry_base * 2^n, retry_cap)`.
    pub retry_base: Duration,
    /// Upper bound on any single backoff delay.
    pub retry_cap: Duration,
    /// Retry ceiling applied to nodes that do not declare their own.
    pub default_max_retries: u32,
    /// Hard handler timeout applied to nodes that do not declare their own.
    pub default_timeout: Duration,
    /// Sleep used when a popped node is not yet eligible and is re-queued.
    pub deferral_yield: Duration,
    /// Fixed-window limit applied to nodes that do not declare their own.
    /// `None` leaves such nodes unthrottled.
    pub default_rate_limit: Option<RateLimit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_base: Duration::from_millis(1000),
            retry_cap: Duration::from_millis(30_000),
            default_max_retries: 3,
            default_timeout: Duration::from_secs(30),
            deferral_yield: Duration::from_millis(10),
            default_rate_limit: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `RELAYGRAPH_*` environment overrides.
    ///
    /// Recognized keys (all optional): `RELAYGRAPH_RETRY_BASE_MS`,
    /// `RELAYGRAPH_RETRY_CAP_MS`, `RELAYGRAPH_MAX_RETRIES`,
    /// `RELAYGRAPH_NODE_TIMEOUT_MS`. Malformed values are logged and
    /// ignored.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(ms) = env_u64("RELAYGRAPH_RETRY_BASE_MS") {
            config.retry_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("RELAYGRAPH_RETRY_CAP_MS") {
            config.retry_cap = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("RELAYGRAPH_MAX_RETRIES") {
            config.default_max_retries = n as u32;
        }
        if let Some(ms) = env_u64("RELAYGRAPH_NODE_TIMEOUT_MS") {
            config.default_timeout = Duration::from_millis(ms);
        }
        config
    }

    #[must_use]
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    #[must_use]
    pub fn with_retry_cap(mut self, retry_cap: Duration) -> Self {
        self.retry_cap = retry_cap;
        self
    }

    #[must_use]
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_deferral_yield(mut self, deferral_yield: Duration) -> Self {
        self.deferral_yield = deferral_yield;
        self
    }

    #[must_use]
    pub fn with_default_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.default_rate_limit = Some(rate_limit);
        self
    }

    /// Backoff delay for the given retry number (1-based):
    /// `min(retry_base * 2^retry_count, retry_cap)`.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_count.min(31));
        self.retry_base
            .saturating_mul(factor)
            .min(self.retry_cap)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, raw, "ignoring malformed engine config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(8000));
        // 2^6 seconds would be 64s; capped at 30s.
        assert_eq!(config.backoff_delay(6), Duration::from_millis(30_000));
    }
}
