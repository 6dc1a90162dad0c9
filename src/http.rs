use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::{Error, RequestContext, Result};

/// Anything that can execute a request.
///
/// The raw `reqwest::Client`, the authenticating [`OAuthClient`](crate::OAuthClient)
/// and the [`RetryingClient`](crate::RetryingClient) all implement it, so they
/// stack on top of each other.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, ctx: &RequestContext, request: Request) -> Result<Response>;
}

#[async_trait]
impl HttpClient for reqwest::Client {
    async fn execute(&self, _ctx: &RequestContext, request: Request) -> Result<Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(Error::Transport)
    }
}

#[async_trait]
impl<T> HttpClient for Arc<T>
where
    T: HttpClient + ?Sized,
{
    async fn execute(&self, ctx: &RequestContext, request: Request) -> Result<Response> {
        (**self).execute(ctx, request).await
    }
}
