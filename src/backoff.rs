use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Response};

/// Computes how long to wait before the next attempt.
///
/// Implemented for any `Fn(min, max, attempt, response) -> Duration`, so a
/// plain function such as [`default_backoff`] can be used directly.
pub trait Backoff: Send + Sync {
    fn backoff(
        &self,
        min: Duration,
        max: Duration,
        attempt: u32,
        response: Option<&Response>,
    ) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(Duration, Duration, u32, Option<&Response>) -> Duration + Send + Sync,
{
    fn backoff(
        &self,
        min: Duration,
        max: Duration,
        attempt: u32,
        response: Option<&Response>,
    ) -> Duration {
        self(min, max, attempt, response)
    }
}

/// Honors a positive `Retry-After` header (capped at `max`), otherwise falls
/// back to [`exponential_backoff`].
///
/// A `Retry-After` value below `min` is used as-is: the server's explicit
/// instruction wins over the configured floor. A value of `0` is treated like
/// a missing header.
pub fn default_backoff(
    min: Duration,
    max: Duration,
    attempt: u32,
    response: Option<&Response>,
) -> Duration {
    match response.and_then(retry_after) {
        Some(wait) if !wait.is_zero() => wait.min(max),
        _ => exponential_backoff(min, max, attempt),
    }
}

/// `min * 2^attempt`, clamped to `max`.
pub fn exponential_backoff(min: Duration, max: Duration, attempt: u32) -> Duration {
    1u32.checked_shl(attempt)
        .and_then(|factor| min.checked_mul(factor))
        .map_or(max, |wait| wait.min(max))
}

/// Parses `Retry-After` as an integer number of seconds.
///
/// The HTTP-date form is not supported and yields `None`.
pub fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    value.parse::<u64>().ok().map(Duration::from_secs)
}
