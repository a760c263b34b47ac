//! Run configuration: concurrency, retries, timeouts, and rate policy.
//!
//! Durations serialize as integer milliseconds (`*_ms` fields) so settings
//! files stay plain JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::GeoPoint;

/// Default number of lookups in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub concurrency_limit: usize,
    pub retry: RetryPolicy,
    #[serde(rename = "per_call_timeout_ms", with = "millis")]
    pub per_call_timeout: Duration,
    #[serde(rename = "run_timeout_ms", with = "opt_millis")]
    pub run_timeout: Option<Duration>,
    pub rate: RatePolicy,
    pub default_hint: Option<GeoPoint>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            per_call_timeout: DEFAULT_CALL_TIMEOUT,
            run_timeout: None,
            rate: RatePolicy::default(),
            default_hint: None,
        }
    }
}

impl EnrichConfig {
    /// Concurrency limit, never below one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_rate(mut self, rate: RatePolicy) -> Self {
        self.rate = rate;
        self
    }
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: u32,
    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Explicit pacing and budget for calls to the external service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatePolicy {
    /// Minimum spacing between the starts of any two calls.
    #[serde(rename = "min_interval_ms", with = "opt_millis")]
    pub min_interval: Option<Duration>,
    /// Maximum client calls per run, retries included.
    pub max_calls: Option<usize>,
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = EnrichConfig::default();
        assert_eq!(config.concurrency_limit, DEFAULT_CONCURRENCY);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.per_call_timeout, DEFAULT_CALL_TIMEOUT);
        assert!(config.run_timeout.is_none());
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        assert_eq!(EnrichConfig::default().with_concurrency(0).effective_concurrency(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(700),
        };
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_retry(4), Duration::from_millis(700));
        assert_eq!(policy.delay_for_retry(40), Duration::from_millis(700));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EnrichConfig = serde_json::from_value(json!({
            "concurrency_limit": 2,
            "per_call_timeout_ms": 1500,
            "retry": { "max_retries": 5 },
            "rate": { "min_interval_ms": 100 }
        }))
        .unwrap();
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.per_call_timeout, Duration::from_millis(1500));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.rate.min_interval, Some(Duration::from_millis(100)));
        assert_eq!(config.rate.max_calls, None);
    }

    #[test]
    fn test_serializes_millis() {
        let value = serde_json::to_value(EnrichConfig::default().with_run_timeout(Duration::from_secs(3))).unwrap();
        assert_eq!(value["per_call_timeout_ms"], 10_000);
        assert_eq!(value["run_timeout_ms"], 3_000);
        assert_eq!(value["retry"]["base_delay_ms"], 250);
    }
}
