use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use crate::TokenError;

/// Token type the Site24x7 API expects in front of the access token.
pub const ZOHO_TOKEN_TYPE: &str = "Zoho-oauthtoken";

/// A token counts as expired this long before its actual expiry.
pub const EXPIRY_DELTA: Duration = Duration::from_secs(10);

/// An OAuth2 access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Secret sent to the API.
    pub access_token: String,
    /// Scheme used in the `Authorization` header. Empty means `Bearer`.
    pub token_type: String,
    /// Long-lived token used to obtain the next access token.
    pub refresh_token: Option<String>,
    /// `None` means the token does not expire.
    pub expiry: Option<Instant>,
}

impl Token {
    /// A non-expiring token with the default `Bearer` scheme.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: String::new(),
            refresh_token: None,
            expiry: None,
        }
    }

    /// Sets the `Authorization` scheme, e.g. `Zoho-oauthtoken`.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Records the refresh token this access token was issued for.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets an absolute expiry.
    pub fn with_expiry(mut self, expiry: Instant) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Sets the expiry `expires_in` from now.
    pub fn expires_in(self, expires_in: Duration) -> Self {
        let expiry = Instant::now()
            .checked_add(expires_in)
            .unwrap_or_else(far_future);
        self.with_expiry(expiry)
    }

    /// Time left until expiry; zero once expired, `None` for non-expiring tokens.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expiry
            .map(|expiry| expiry.saturating_duration_since(Instant::now()))
    }

    /// `true` once the token is within [`EXPIRY_DELTA`] of its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry
                .checked_sub(EXPIRY_DELTA)
                .map_or(true, |threshold| threshold <= Instant::now()),
            None => false,
        }
    }

    /// A token is valid when it has an access token and has not expired.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Normalized scheme: empty and any casing of `bearer` become `Bearer`.
    pub fn scheme(&self) -> &str {
        if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer") {
            "Bearer"
        } else {
            &self.token_type
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.scheme(), self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

// Roughly a century; `Instant` has no MAX.
fn far_future() -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_secs(100 * 365 * 24 * 60 * 60))
        .unwrap_or(now)
}

/// Produces OAuth2 access tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<Token, TokenError>;
}

#[async_trait]
impl<T> TokenSource for Arc<T>
where
    T: TokenSource + ?Sized,
{
    async fn token(&self) -> Result<Token, TokenError> {
        (**self).token().await
    }
}

/// Always hands out the same token.
#[derive(Clone, Debug)]
pub struct StaticTokenSource(Token);

impl StaticTokenSource {
    /// Serves `token` on every call, whether or not it is still valid.
    pub fn new(token: Token) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Token, TokenError> {
        Ok(self.0.clone())
    }
}
