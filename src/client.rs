use std::{fmt, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderValue, ACCEPT, COOKIE},
    Method, Request, Response, Url,
};

use crate::{
    token::ZOHO_TOKEN_TYPE, ClientConfig, Error, ExpiryCorrectingSource, HttpClient, OAuthClient,
    RefreshTokenSource, RequestContext, Result, RetryingClient, Token,
};

/// `Accept` header value the Site24x7 API versions its responses on.
pub const API_ACCEPT: &str = "application/json; version=2.1";

/// The transport stack [`ApiClient::new`] builds.
pub type DefaultTransport =
    RetryingClient<OAuthClient<ExpiryCorrectingSource<RefreshTokenSource>>>;

/// Authenticated, retrying HTTP client for the Site24x7 API.
///
/// Callers build requests with [`ApiClient::request`] and send them with
/// [`ApiClient::execute`]; token refresh and retries stay out of sight.
/// Cloning is cheap and clones share the token cache.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpClient>,
    api_base_url: Url,
    zaaid: Option<HeaderValue>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("zaaid", &self.zaaid)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds the full stack: refresh-token source behind the expiry
    /// corrector, bearer authentication, and retries per `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_base_url = parse_base_url(config.api_base_url())?;
        let transport = build_transport(&config)?;
        let client = Self {
            transport: Arc::new(transport),
            api_base_url,
            zaaid: None,
        };

        match config.zaaid.as_deref() {
            Some(zaaid) => client.with_zaaid(zaaid),
            None => Ok(client),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// See [`ClientConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Wraps a caller-provided client, which must handle authentication itself.
    pub fn with_http_client<C>(http: C, api_base_url: &str) -> Result<Self>
    where
        C: HttpClient + 'static,
    {
        Ok(Self {
            transport: Arc::new(http),
            api_base_url: parse_base_url(api_base_url)?,
            zaaid: None,
        })
    }

    /// Scopes every request built by [`request`](Self::request) to an MSP
    /// customer account through the `zaaid` cookie.
    pub fn with_zaaid(mut self, zaaid: &str) -> Result<Self> {
        self.zaaid = Some(HeaderValue::from_str(&format!("zaaid={zaaid}"))?);
        Ok(self)
    }

    /// Base URL that request paths are joined onto, always ending in `/`.
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// Builds a request for `path` relative to the API base URL, e.g. `monitors/123`.
    pub fn request(&self, method: Method, path: &str) -> Result<Request> {
        let url = self
            .api_base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| Error::Config(format!("invalid request path '{path}': {err}")))?;

        let mut request = Request::new(method, url);
        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
        if let Some(zaaid) = &self.zaaid {
            headers.insert(COOKIE, zaaid.clone());
        }
        Ok(request)
    }

    /// Sends `request` with a context that never fires.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.execute_with(&RequestContext::background(), request)
            .await
    }

    /// Sends `request`, stopping retries once `ctx` fires.
    pub async fn execute_with(&self, ctx: &RequestContext, request: Request) -> Result<Response> {
        self.transport.execute(ctx, request).await
    }
}

fn build_transport(config: &ClientConfig) -> Result<DefaultTransport> {
    let refresher = RefreshTokenSource::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.refresh_token.clone(),
        config.token_url(),
    )?;

    let source = match seeded_token(config) {
        Some(token) => ExpiryCorrectingSource::with_token(refresher, token),
        None => ExpiryCorrectingSource::new(refresher),
    };

    let http = reqwest::Client::builder()
        .build()
        .map_err(Error::Transport)?;

    Ok(RetryingClient::new(
        OAuthClient::new(http, source),
        config.retry_config(),
    ))
}

fn seeded_token(config: &ClientConfig) -> Option<Token> {
    let access_token = config.access_token.as_deref()?;
    let token = Token::new(access_token)
        .with_token_type(ZOHO_TOKEN_TYPE)
        .with_refresh_token(config.refresh_token.clone());

    Some(match config.access_token_expiry_secs {
        Some(secs) => token.expires_in(Duration::from_secs(secs)),
        None => token,
    })
}

// `Url::join` drops the last segment unless the base ends with a slash.
fn parse_base_url(base: &str) -> Result<Url> {
    let normalized = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&normalized)
        .map_err(|err| Error::Config(format!("invalid API base URL '{base}': {err}")))
}
