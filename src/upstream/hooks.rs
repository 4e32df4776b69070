//! Proxy lifecycle hooks.
//!
//! One hooks instance is shared by every route; the route is passed in.

use axum::body::Body;
use axum::http::{header, Request, Response};

use crate::config::RouteConfig;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::upstream::error::UpstreamError;

/// Observation points around a forwarded request.
pub trait ForwardHooks: Send + Sync + std::fmt::Debug {
    /// Called with the fully rewritten request just before it is sent.
    fn before_forward(&self, _ctx: &RequestContext, _route: &RouteConfig, _request: &mut Request<Body>) {}

    /// Called once the backend's response head has arrived.
    fn after_response(&self, _ctx: &RequestContext, _route: &RouteConfig, _response: &Response<Body>) {}

    /// Called when the round trip fails or exceeds its deadline.
    fn on_failure(&self, _ctx: &RequestContext, _route: &RouteConfig, _error: &UpstreamError) {}
}

/// Structured log lines and metrics for every forwarded request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl ForwardHooks for TracingHooks {
    fn before_forward(&self, ctx: &RequestContext, route: &RouteConfig, request: &mut Request<Body>) {
        tracing::info!(
            request_id = %ctx.request_id(),
            service = %route.name,
            method = %ctx.method(),
            path = %ctx.path(),
            upstream = %request.uri(),
            "Forwarding request"
        );
    }

    fn after_response(&self, ctx: &RequestContext, route: &RouteConfig, response: &Response<Body>) {
        let bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        tracing::info!(
            request_id = %ctx.request_id(),
            service = %route.name,
            status = response.status().as_u16(),
            bytes,
            latency_ms = ctx.elapsed().as_millis() as u64,
            "Response received"
        );
    }

    fn on_failure(&self, ctx: &RequestContext, route: &RouteConfig, error: &UpstreamError) {
        let class = error.class();
        tracing::error!(
            request_id = %ctx.request_id(),
            service = %route.name,
            class = class.as_str(),
            error = %error,
            "Upstream request failed"
        );
        metrics::record_upstream_failure(&route.name, class.as_str());
    }
}
