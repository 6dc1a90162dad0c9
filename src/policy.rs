use reqwest::{Response, StatusCode};

use crate::{Error, RequestContext, Result};

/// Decides whether a completed attempt should be retried.
///
/// `Ok(true)` schedules another attempt, `Ok(false)` makes the attempt's own
/// outcome final, and `Err` ends the request with that error. Implemented for
/// any matching `Fn`, so [`default_retry_policy`] can be used directly.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(
        &self,
        ctx: &RequestContext,
        response: Option<&Response>,
        error: Option<&Error>,
    ) -> Result<bool>;
}

impl<F> RetryPolicy for F
where
    F: Fn(&RequestContext, Option<&Response>, Option<&Error>) -> Result<bool> + Send + Sync,
{
    fn should_retry(
        &self,
        ctx: &RequestContext,
        response: Option<&Response>,
        error: Option<&Error>,
    ) -> Result<bool> {
        self(ctx, response, error)
    }
}

/// Retries connection errors, server errors and throttling.
///
/// A fired context always wins, even over a retryable response.
pub fn default_retry_policy(
    ctx: &RequestContext,
    response: Option<&Response>,
    error: Option<&Error>,
) -> Result<bool> {
    if let Some(cancelled) = ctx.err() {
        return Err(Error::Cancelled(cancelled));
    }

    if error.is_some() {
        return Ok(true);
    }

    Ok(response.is_some_and(|response| is_retryable_status(response.status().as_u16())))
}

/// `0`, `429` and every `5xx` except `501 Not Implemented`.
///
/// Codes above 599 count as server errors too.
pub fn is_retryable_status(status: u16) -> bool {
    status == 0
        || status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        || (status >= 500 && status != StatusCode::NOT_IMPLEMENTED.as_u16())
}
