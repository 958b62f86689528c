//! Tracker configuration.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use trk_core::{ApiKey, DEFAULT_HOST};

use crate::transport::DEFAULT_TIMEOUT;

/// Statuses counted as a confirmed delivery unless configured otherwise.
pub const DEFAULT_SUCCESS_STATUSES: RangeInclusive<u16> = 200..=299;

/// Configuration for a [`Tracker`](crate::Tracker).
#[derive(Clone)]
pub struct TrackerConfig {
    /// Account key sent with every request.
    pub api_key: ApiKey,
    /// Host receiving tracking requests.
    pub host: String,
    /// Use HTTPS rather than HTTP.
    pub secure: bool,
    /// Transport statuses that remove a request from the queue.
    pub success_statuses: RangeInclusive<u16>,
    /// Delay schedule after failed deliveries.
    pub retry: RetryPolicy,
    /// Timeout for the default HTTP transport.
    pub request_timeout: Duration,
}

impl TrackerConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            host: DEFAULT_HOST.to_string(),
            secure: true,
            success_statuses: DEFAULT_SUCCESS_STATUSES,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("api_key", &"[REDACTED]")
            .field("host", &self.host)
            .field("secure", &self.secure)
            .field("success_statuses", &self.success_statuses)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Exponential backoff for retrying the head of the queue.
///
/// The same request is retried until it succeeds; only the delay grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive failures.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}
