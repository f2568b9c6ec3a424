//! The transport capability.
//!
//! Everything that talks to the remote API goes through [`Transport::invoke`].
//! The HTTP implementation lives in `courier-transport`; tests use
//! `MockTransport` from [`crate::testing`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::params::Params;
use crate::value::Value;

/// Invokes remote API methods.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Calls `method` with `params` and returns the envelope's `result`.
    async fn invoke(&self, method: &str, params: Params) -> ApiResult<Value>;

    /// A short name for logs.
    fn name(&self) -> &'static str {
        "transport"
    }
}

/// Shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;

// =============================================================================
// Retry Configuration
// =============================================================================

/// Exponential backoff settings for retrying failed calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each consecutive failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay before retry number `attempt`, stretched to at least the
    /// server-requested `retry_after` seconds.
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let backoff = self.delay_for(attempt);
        match retry_after {
            Some(secs) => backoff.max(Duration::from_secs(secs)),
            None => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(800));
        assert_eq!(retry.delay_for(4), Duration::from_secs(1));
        assert_eq!(retry.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_after_hint_wins_when_longer() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_with_hint(0, Some(30)), Duration::from_secs(30));
        assert_eq!(retry.delay_with_hint(2, Some(1)), Duration::from_secs(4));
        assert_eq!(retry.delay_with_hint(0, None), Duration::from_secs(1));
    }
}
