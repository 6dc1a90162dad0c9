use std::fmt;

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    RefreshToken, TokenResponse, TokenUrl,
};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Request, Response,
};

use crate::{HttpClient, RequestContext, Result, Token, TokenError, TokenSource};

type ZohoOauth2Client =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Exchanges a long-lived refresh token for a fresh access token on every call.
///
/// Holds no cache; wrap it in an
/// [`ExpiryCorrectingSource`](crate::ExpiryCorrectingSource) for reuse and
/// expiry repair. Client credentials are sent in the request body.
pub struct RefreshTokenSource {
    oauth: ZohoOauth2Client,
    http: reqwest::Client,
    token_url: String,
    refresh_token: String,
}

impl RefreshTokenSource {
    /// Fails if `token_url` is not an absolute URL.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        token_url: impl Into<String>,
    ) -> std::result::Result<Self, TokenError> {
        let token_url = token_url.into();
        let endpoint = TokenUrl::new(token_url.clone())
            .map_err(|err| TokenError::InvalidUrl(err.to_string()))?;
        let oauth = BasicClient::new(ClientId::new(client_id.into()))
            .set_client_secret(ClientSecret::new(client_secret.into()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(endpoint);

        // Token endpoints must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(TokenError::Request)?;

        Ok(Self {
            oauth,
            http,
            token_url,
            refresh_token: refresh_token.into(),
        })
    }

    /// Endpoint the refresh grant is posted to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl fmt::Debug for RefreshTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenSource")
            .field("token_url", &self.token_url())
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn token(&self) -> std::result::Result<Token, TokenError> {
        let refresh_token = RefreshToken::new(self.refresh_token.clone());
        let response = self
            .oauth
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            expires_in = ?response.expires_in(),
            "refreshed access token"
        );

        let refresh_token = response
            .refresh_token()
            .map(|token| token.secret().clone())
            .unwrap_or_else(|| self.refresh_token.clone());
        let token_type: &str = response.token_type().as_ref();
        let token = Token::new(response.access_token().secret().clone())
            .with_token_type(token_type)
            .with_refresh_token(refresh_token);

        Ok(match response.expires_in() {
            Some(expires_in) => token.expires_in(expires_in),
            None => token,
        })
    }
}

/// Attaches an access token from `S` to every request it sends.
pub struct OAuthClient<S> {
    http: reqwest::Client,
    source: S,
}

impl<S> OAuthClient<S> {
    /// Sends requests through `http`, authenticated with tokens from `source`.
    pub fn new(http: reqwest::Client, source: S) -> Self {
        Self { http, source }
    }

    /// Where access tokens come from.
    pub fn token_source(&self) -> &S {
        &self.source
    }
}

impl<S> fmt::Debug for OAuthClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: TokenSource> HttpClient for OAuthClient<S> {
    async fn execute(&self, ctx: &RequestContext, mut request: Request) -> Result<Response> {
        let token = self.source.token().await?;

        let mut authorization = HeaderValue::from_str(&token.authorization_value())?;
        authorization.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, authorization);

        HttpClient::execute(&self.http, ctx, request).await
    }
}
