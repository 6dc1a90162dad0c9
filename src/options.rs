use std::{fmt, sync::Arc, time::Duration};

use crate::{
    backoff::{default_backoff, Backoff},
    policy::{default_retry_policy, RetryPolicy},
};

/// Shortest exponential wait when none is configured.
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);
/// Longest wait when none is configured.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);
/// Retries after the initial attempt, for five sends in total.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Configures the backoff-retry behavior of a [`RetryingClient`](crate::RetryingClient).
#[derive(Clone)]
pub struct RetryConfig {
    /// Lower bound of the exponential wait. Zero means [`DEFAULT_MIN_WAIT`].
    pub min_wait: Duration,
    /// Upper bound for any wait, including `Retry-After`. Zero means [`DEFAULT_MAX_WAIT`].
    pub max_wait: Duration,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Decides after each attempt whether to try again.
    pub check_retry: Arc<dyn RetryPolicy>,
    /// Computes the wait before each retry.
    pub backoff: Arc<dyn Backoff>,
}

impl RetryConfig {
    /// Sets the lower bound of the exponential wait.
    pub fn with_min_wait(mut self, min_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self
    }

    /// Sets the cap applied to every wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets how many retries follow the initial attempt. Zero disables retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces [`default_retry_policy`].
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.check_retry = Arc::new(policy);
        self
    }

    /// Replaces [`default_backoff`].
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Replaces unset (zero) wait bounds with their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.min_wait.is_zero() {
            self.min_wait = DEFAULT_MIN_WAIT;
        }
        if self.max_wait.is_zero() {
            self.max_wait = DEFAULT_MAX_WAIT;
        }
        self
    }

    pub(crate) fn wait(
        &self,
        attempt: u32,
        response: Option<&reqwest::Response>,
    ) -> Duration {
        self.backoff
            .backoff(self.min_wait, self.max_wait, attempt, response)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_wait: DEFAULT_MIN_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
            max_retries: DEFAULT_MAX_RETRIES,
            check_retry: Arc::new(default_retry_policy),
            backoff: Arc::new(default_backoff),
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("min_wait", &self.min_wait)
            .field("max_wait", &self.max_wait)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
