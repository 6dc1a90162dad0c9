use std::fmt;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::{Error, HttpClient, RequestContext, Result, RetryConfig};

/// Most bytes of a discarded response read before retrying, so the connection
/// can go back to the pool.
const DRAIN_LIMIT: usize = 4096;

/// Wraps an [`HttpClient`] with backoff-retry logic.
///
/// Every attempt sends a replay of the original request, so request bodies
/// must be buffered; streaming bodies are rejected before the first send.
pub struct RetryingClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C> RetryingClient<C> {
    /// Wraps `inner`; zero waits in `config` are replaced by their defaults.
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self {
            inner,
            config: config.with_defaults(),
        }
    }

    /// Effective retry settings.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryingClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingClient")
            .field("inner", &self.inner)
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for RetryingClient<C> {
    async fn execute(&self, ctx: &RequestContext, request: Request) -> Result<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        if request.try_clone().is_none() {
            return Err(Error::BodyNotReplayable { method, url });
        }

        let give_up = |attempts: u32, source: Error| {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %url, attempts, error = %source, "giving up on request");

            Error::GaveUp {
                method: method.clone(),
                url: url.clone(),
                attempts,
                source: Box::new(source),
            }
        };

        let mut attempt = 0u32;
        loop {
            let replay = request
                .try_clone()
                .ok_or_else(|| Error::BodyNotReplayable {
                    method: method.clone(),
                    url: url.clone(),
                })?;
            let outcome = self.inner.execute(ctx, replay).await;

            let retry = match self.config.check_retry.should_retry(
                ctx,
                outcome.as_ref().ok(),
                outcome.as_ref().err(),
            ) {
                Ok(retry) => retry,
                Err(err) => return Err(give_up(attempt + 1, err)),
            };

            if !retry || attempt >= self.config.max_retries {
                return outcome.map_err(|err| give_up(attempt + 1, err));
            }

            let wait = self.config.wait(attempt, outcome.as_ref().ok());

            #[cfg(feature = "tracing")]
            tracing::debug!(
                %method,
                %url,
                attempt,
                status = outcome.as_ref().ok().map(|response| response.status().as_u16()),
                error = outcome.as_ref().err().map(|err| err.to_string()),
                "retrying request after {} ms",
                wait.as_millis()
            );

            tokio::select! {
                _ = ctx.done() => {
                    let cancelled = ctx.err().unwrap_or(crate::Cancelled::Canceled);
                    return Err(give_up(attempt + 1, Error::Cancelled(cancelled)));
                }
                _ = async {
                    if let Ok(response) = outcome {
                        drain(response).await;
                    }
                    tokio::time::sleep(wait).await;
                } => {}
            }

            attempt += 1;
        }
    }
}

/// Reads up to [`DRAIN_LIMIT`] bytes of `response` and drops the rest.
///
/// Returns the number of bytes read.
async fn drain(mut response: Response) -> usize {
    let mut read = 0;
    while read < DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len(),
            _ => break,
        }
    }
    read
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::{Body, Method, Request, Response, Url};

    use super::{drain, RetryingClient, DRAIN_LIMIT};
    use crate::{Error, HttpClient, RequestContext, Result, RetryConfig, TokenError};

    enum Scripted {
        Status(u16),
        Fail(&'static str),
    }

    struct ScriptedClient {
        script: Mutex<VecDeque<Scripted>>,
        sends: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                sends: AtomicUsize::new(0),
            }
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn execute(&self, _ctx: &RequestContext, _request: Request) -> Result<Response> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .expect("script mutex must not be poisoned")
                .pop_front()
                .unwrap_or(Scripted::Status(500));
            match next {
                Scripted::Status(status) => Ok(http::Response::builder()
                    .status(status)
                    .body("")
                    .unwrap()
                    .into()),
                Scripted::Fail(message) => {
                    Err(Error::Token(TokenError::Other(message.to_owned())))
                }
            }
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::default()
            .with_min_wait(Duration::from_millis(1))
            .with_max_wait(Duration::from_millis(2))
            .with_max_retries(max_retries)
    }

    fn scripted(script: Vec<Scripted>, max_retries: u32) -> RetryingClient<ScriptedClient> {
        RetryingClient::new(ScriptedClient::new(script), fast_config(max_retries))
    }

    fn get() -> Request {
        Request::new(
            Method::GET,
            Url::parse("https://www.site24x7.com/api/monitors").unwrap(),
        )
    }

    #[tokio::test]
    async fn success_is_returned_without_retry() {
        let client = scripted(vec![Scripted::Status(200)], 4);
        let response = client
            .execute(&RequestContext::background(), get())
            .await
            .expect("must succeed");
        assert_eq!(response.status(), 200);
        assert_eq!(client.inner().sends(), 1);
    }

    #[tokio::test]
    async fn retryable_statuses_are_retried_until_success() {
        let client = RetryingClient::new(
            ScriptedClient::new([
                Scripted::Status(503),
                Scripted::Status(429),
                Scripted::Fail("connection reset"),
                Scripted::Status(204),
            ]),
            fast_config(4),
        );
        let response = client
            .execute(&RequestContext::background(), get())
            .await
            .expect("must succeed after retries");
        assert_eq!(response.status(), 204);
        assert_eq!(client.inner().sends(), 4);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_response() {
        let client = scripted(Vec::new(), 2);
        let response = client
            .execute(&RequestContext::background(), get())
            .await
            .expect("last response is final");
        assert_eq!(response.status(), 500);
        assert_eq!(client.inner().sends(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_wrap_last_error_with_attempts() {
        let client = RetryingClient::new(
            ScriptedClient::new([
                Scripted::Fail("first"),
                Scripted::Fail("second"),
                Scripted::Fail("third"),
            ]),
            fast_config(2),
        );
        let err = client
            .execute(&RequestContext::background(), get())
            .await
            .expect_err("must give up");
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(
            err.to_string(),
            "GET https://www.site24x7.com/api/monitors: \
             giving up after 3 attempt(s): token error: third"
        );
        assert!(matches!(err.root(), Error::Token(TokenError::Other(m)) if m == "third"));
    }

    #[tokio::test]
    async fn first_attempt_failure_reports_one_attempt() {
        let client = scripted(vec![Scripted::Fail("down")], 0);
        let err = client
            .execute(&RequestContext::background(), get())
            .await
            .expect_err("no retries configured");
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(client.inner().sends(), 1);
    }

    #[tokio::test]
    async fn permanent_statuses_are_not_retried() {
        for status in [501, 400, 404, 302, 200] {
            let client = scripted(vec![Scripted::Status(status)], 4);
            let response = client
                .execute(&RequestContext::background(), get())
                .await
                .expect("permanent statuses are returned as responses");
            assert_eq!(response.status(), status);
            assert_eq!(client.inner().sends(), 1, "status {status}");
        }
    }

    #[tokio::test]
    async fn cancelled_context_stops_after_in_flight_attempt() {
        let client = scripted(vec![Scripted::Status(503)], 4);
        let ctx = RequestContext::background();
        ctx.cancel();
        let err = client.execute(&ctx, get()).await.expect_err("cancelled");
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(client.inner().sends(), 1);
    }

    #[tokio::test]
    async fn deadline_interrupts_backoff_sleep() {
        let config = RetryConfig::default()
            .with_min_wait(Duration::from_secs(10))
            .with_max_wait(Duration::from_secs(10));
        let client = RetryingClient::new(ScriptedClient::new([Scripted::Status(503)]), config);
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(20));

        let started = std::time::Instant::now();
        let err = client.execute(&ctx, get()).await.expect_err("deadline");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.is_cancelled());
        assert_eq!(client.inner().sends(), 1);
    }

    #[tokio::test]
    async fn custom_policy_error_is_surfaced() {
        let config = fast_config(4).with_retry_policy(
            |_: &RequestContext, _: Option<&Response>, _: Option<&Error>| -> Result<bool> {
                Err(Error::Config("policy refused".to_owned()))
            },
        );
        let client = RetryingClient::new(ScriptedClient::new([Scripted::Status(503)]), config);
        let err = client
            .execute(&RequestContext::background(), get())
            .await
            .expect_err("policy error is terminal");
        assert!(matches!(err.root(), Error::Config(_)));
        assert_eq!(client.inner().sends(), 1);
    }

    fn chunked_body(chunks: usize, chunk_len: usize) -> Body {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
            (0..chunks).map(|_| Ok(vec![b'x'; chunk_len])).collect();
        Body::wrap_stream(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn streaming_body_is_rejected_before_sending() {
        let client = scripted(vec![Scripted::Status(200)], 4);
        let mut request = Request::new(
            Method::POST,
            Url::parse("https://www.site24x7.com/api/monitors").unwrap(),
        );
        *request.body_mut() = Some(chunked_body(2, 16));

        let err = client
            .execute(&RequestContext::background(), request)
            .await
            .expect_err("streaming bodies cannot be retried");

        assert!(matches!(
            &err,
            Error::BodyNotReplayable { method, url }
                if *method == Method::POST && url.path() == "/api/monitors"
        ));
        assert_eq!(err.attempts(), None);
        assert_eq!(client.inner().sends(), 0);
    }

    #[tokio::test]
    async fn drain_reads_small_bodies_fully() {
        let response: Response = http::Response::builder()
            .status(503)
            .body("service unavailable")
            .unwrap()
            .into();
        assert_eq!(drain(response).await, "service unavailable".len());
    }

    #[tokio::test]
    async fn drain_stops_at_limit() {
        let response: Response = http::Response::builder()
            .status(503)
            .body(chunked_body(16, 1024))
            .unwrap()
            .into();
        assert_eq!(drain(response).await, DRAIN_LIMIT);
    }

    #[test]
    fn zero_waits_are_defaulted_on_construction() {
        let config = RetryConfig::default()
            .with_min_wait(Duration::ZERO)
            .with_max_wait(Duration::ZERO);
        let client = RetryingClient::new(ScriptedClient::new(Vec::new()), config);
        assert_eq!(client.config().min_wait, Duration::from_secs(1));
        assert_eq!(client.config().max_wait, Duration::from_secs(30));
    }
}
