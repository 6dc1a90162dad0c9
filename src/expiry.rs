//! Token source wrapper for the Zoho accounts server.
//!
//! The server hands out access tokens that live one hour but reports
//! `expires_in` in milliseconds instead of seconds (RFC 6749 §5.1 requires
//! seconds). Read as seconds, every token appears to live ~1000 hours and is
//! never refreshed in time. [`ExpiryCorrectingSource`] detects expiries beyond
//! [`MAX_EXPIRES_IN`] and clamps them.

use std::{
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Token, TokenError, TokenSource};

/// Longest token lifetime treated as genuine.
pub const MAX_EXPIRES_IN: Duration = Duration::from_secs(60 * 60);

/// Caches tokens from a delegate and repairs broken expiries.
///
/// The delegate is only asked for a new token when the cached one is missing
/// or no longer valid. All callers serialize on one lock, so at most one
/// delegate fetch is in flight at a time.
pub struct ExpiryCorrectingSource<S> {
    delegate: S,
    cached: Mutex<Option<Token>>,
}

impl<S> ExpiryCorrectingSource<S> {
    /// Starts with an empty cache.
    pub fn new(delegate: S) -> Self {
        Self {
            delegate,
            cached: Mutex::new(None),
        }
    }

    /// Seeds the cache with an already issued token.
    pub fn with_token(delegate: S, mut token: Token) -> Self {
        correct_expiry(&mut token, Instant::now());
        Self {
            delegate,
            cached: Mutex::new(Some(token)),
        }
    }

    /// The wrapped source that fetches fresh tokens.
    pub fn delegate(&self) -> &S {
        &self.delegate
    }
}

impl<S> fmt::Debug for ExpiryCorrectingSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryCorrectingSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: TokenSource> TokenSource for ExpiryCorrectingSource<S> {
    async fn token(&self) -> Result<Token, TokenError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = &*cached {
            if token.is_valid() {
                return Ok(token.clone());
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("fetching new access token");

        let mut token = self.delegate.token().await?;
        correct_expiry(&mut token, Instant::now());

        *cached = Some(token.clone());
        Ok(token)
    }
}

/// Clamps an expiry more than [`MAX_EXPIRES_IN`] after `now` to exactly that.
///
/// Returns `true` if the token was changed.
pub fn correct_expiry(token: &mut Token, now: Instant) -> bool {
    let Some(expiry) = token.expiry else {
        return false;
    };
    if expiry.saturating_duration_since(now) <= MAX_EXPIRES_IN {
        return false;
    }

    #[cfg(feature = "tracing")]
    tracing::warn!(
        reported_secs = expiry.saturating_duration_since(now).as_secs(),
        "token expiry exceeds {}s, clamping",
        MAX_EXPIRES_IN.as_secs()
    );

    token.expiry = Some(now + MAX_EXPIRES_IN);
    true
}
