//! HTTP client capability used by the dispatcher.

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::upstream::error::UpstreamError;

/// Sends a fully-addressed request to a backend.
///
/// Implementations return the backend's response for any status; only
/// transport failures are errors. Deadlines are applied by the caller.
pub trait UpstreamClient: Send + Sync + std::fmt::Debug {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, UpstreamError>>;
}

/// Pooled HTTP/1.1 client over hyper-util.
#[derive(Debug, Clone)]
pub struct HyperClient {
    inner: Client<HttpConnector, Body>,
}

impl HyperClient {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClient for HyperClient {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, UpstreamError>> {
        let client = self.inner.clone();
        Box::pin(async move {
            let response = client.request(request).await?;
            Ok(response.map(Body::new))
        })
    }
}
