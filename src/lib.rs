//! `site24x7-http` is the resilient transport beneath a Site24x7 API client.
//!
//! It stacks three layers, each an [`HttpClient`]:
//! - [`RetryingClient`] retries transport errors, `429` and `5xx` (except `501`)
//!   with exponential backoff that honors `Retry-After`;
//! - [`OAuthClient`] attaches an access token to every request;
//! - [`ExpiryCorrectingSource`] caches tokens and repairs the expiry the Zoho
//!   accounts server reports in milliseconds instead of seconds.
//!
//! [`ApiClient`] wires them together from a [`ClientConfig`].

mod backoff;
mod client;
mod config;
mod context;
mod error;
mod expiry;
mod http;
mod oauth;
mod options;
mod policy;
mod retry;
mod token;

pub use backoff::{default_backoff, exponential_backoff, retry_after, Backoff};
pub use client::{ApiClient, DefaultTransport, API_ACCEPT};
pub use config::{ClientConfig, DataCenter};
pub use context::RequestContext;
pub use error::{Cancelled, Error, TokenError};
pub use expiry::{correct_expiry, ExpiryCorrectingSource, MAX_EXPIRES_IN};
pub use http::HttpClient;
pub use oauth::{OAuthClient, RefreshTokenSource};
pub use options::{RetryConfig, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WAIT, DEFAULT_MIN_WAIT};
pub use policy::{default_retry_policy, is_retryable_status, RetryPolicy};
pub use retry::RetryingClient;
pub use token::{StaticTokenSource, Token, TokenSource, EXPIRY_DELTA, ZOHO_TOKEN_TYPE};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, Error>;
