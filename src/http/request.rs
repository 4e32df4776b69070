//! Request identification.
//!
//! # Responsibilities
//! - Assign the correlation ID (inbound X-Request-ID or a fresh UUID v4)
//! - Capture the per-request context threaded through the pipeline
//!
//! # Design Decisions
//! - Request ID assigned as early as possible for tracing
//! - The context is a value passed to each stage, never stored on the
//!   transport request
//! - The context is immutable; route resolution yields a new context

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use uuid::Uuid;

use crate::config::RouteConfig;

/// Correlation header, honored inbound and always set outbound.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation identifier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId {
    id: String,
    header: HeaderValue,
}

impl RequestId {
    /// Reuse a non-empty inbound X-Request-ID verbatim, otherwise generate one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|value| {
                let id = value.to_str().ok()?;
                (!id.trim().is_empty()).then(|| Self {
                    id: id.to_string(),
                    header: value.clone(),
                })
            })
            .unwrap_or_else(Self::generate)
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self::from(Uuid::new_v4().to_string().as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn header_value(&self) -> HeaderValue {
        self.header.clone()
    }
}

impl From<&str> for RequestId {
    /// Characters that cannot appear in a header are dropped.
    fn from(id: &str) -> Self {
        let id: String = id
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();
        let header = HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static(""));
        Self { id, header }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Everything the pipeline knows about a request besides its body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    query: Option<String>,
    client: IpAddr,
    received_at: Instant,
    matched_route: Option<Arc<RouteConfig>>,
}

impl RequestContext {
    /// Capture ingress data and assign the correlation ID.
    pub fn identify(request: &Request<Body>, client: IpAddr) -> Self {
        Self {
            request_id: RequestId::from_headers(request.headers()),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            client,
            received_at: Instant::now(),
            matched_route: None,
        }
    }

    /// The same request, bound to the route that owns it.
    pub fn with_route(self, route: Arc<RouteConfig>) -> Self {
        Self {
            matched_route: Some(route),
            ..self
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn client(&self) -> IpAddr {
        self.client
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    pub fn matched_route(&self) -> Option<&Arc<RouteConfig>> {
        self.matched_route.as_ref()
    }
}
