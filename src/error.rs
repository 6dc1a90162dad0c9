use reqwest::{Method, Url};

/// Reason a [`RequestContext`](crate::RequestContext) stopped further work.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Cancelled {
    /// The context was cancelled explicitly.
    #[error("request cancelled")]
    Canceled,
    /// The context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The caller's context was cancelled or its deadline passed.
    #[error("{0}")]
    Cancelled(#[from] Cancelled),
    /// Access token could not be obtained.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    /// Access token could not be encoded as an `Authorization` header.
    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// Request body is a stream and cannot be sent more than once.
    #[error("{method} {url}: request body cannot be replayed across retries")]
    BodyNotReplayable { method: Method, url: Url },
    /// Terminal failure of a retried request.
    #[error("{method} {url}: giving up after {attempts} attempt(s): {source}")]
    GaveUp {
        method: Method,
        url: Url,
        /// Number of physical sends performed.
        attempts: u32,
        source: Box<Error>,
    },
    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` if this error, or the error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled(_) => true,
            Error::GaveUp { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Number of attempts made before giving up, if this is a retry failure.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::GaveUp { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The innermost error, unwrapping [`Error::GaveUp`].
    pub fn root(&self) -> &Error {
        match self {
            Error::GaveUp { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Error returned by a [`TokenSource`](crate::TokenSource).
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The authorization server rejected the token request.
    #[error("oauth2 server error: {error}")]
    Server {
        error: String,
        description: Option<String>,
    },
    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The token endpoint answered with a body that is not a token response.
    #[error("invalid token response: {0}")]
    Parse(String),
    /// The token URL is not a valid URL.
    #[error("invalid token url: {0}")]
    InvalidUrl(String),
    /// Any other failure, described by its message.
    #[error("{0}")]
    Other(String),
}

type OauthRequestTokenError = oauth2::RequestTokenError<
    oauth2::HttpClientError<reqwest::Error>,
    oauth2::basic::BasicErrorResponse,
>;

impl From<OauthRequestTokenError> for TokenError {
    fn from(err: OauthRequestTokenError) -> Self {
        match err {
            oauth2::RequestTokenError::ServerResponse(response) => TokenError::Server {
                error: response.error().to_string(),
                description: response.error_description().cloned(),
            },
            oauth2::RequestTokenError::Request(oauth2::HttpClientError::Reqwest(inner)) => {
                TokenError::Request(*inner)
            }
            oauth2::RequestTokenError::Request(other) => TokenError::Other(other.to_string()),
            oauth2::RequestTokenError::Parse(parse_err, body) => TokenError::Parse(format!(
                "{parse_err}; body: {}",
                String::from_utf8_lossy(&body)
            )),
            oauth2::RequestTokenError::Other(message) => TokenError::Other(message),
        }
    }
}
