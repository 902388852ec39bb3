//! Client configuration and retry policy

use std::time::Duration;

use crate::error::{ApiError, Result};

/// Backoff policy applied to retryable failures.
///
/// `max_retries` counts *additional* attempts after the first, so the total
/// number of attempts for a fully exhausted operation is `max_retries + 1`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; useful in tests and fail-fast callers.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before the attempt following `attempt` (0-based count of
    /// attempts already made). A platform-provided `Retry-After` takes
    /// precedence over exponential backoff; both are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after_seconds: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_seconds {
            return Duration::from_secs(seconds).min(self.max_delay);
        }
        let millis =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Construction-time configuration for [`crate::SharePointClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site base URL, e.g. `https://tenant.sharepoint.com/sites/qa`.
    pub site_url: String,
    pub retry: RetryPolicy,
    /// Per-attempt HTTP timeout. Retried operations can take up to
    /// `max_retries * max_delay` on top of this; callers own hard deadlines.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.site_url.trim().is_empty() {
            return Err(ApiError::configuration("SharePoint site URL not configured"));
        }
        Ok(())
    }
}
