//! Request forwarding.
//!
//! # Responsibilities
//! - Rewrite the path for the matched route
//! - Rebuild headers for the target (Host, X-Request-ID, X-Forwarded-*)
//! - Enforce the route's deadline on the round trip
//! - Relay the backend response or classify the failure
//!
//! # Design Decisions
//! - One dispatcher serves every route; the route is data, not a closure
//! - Never retries
//! - The deadline covers connect + response head; the body streams after
//! - Dropping the dispatch future (client gone) drops the upstream call

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};

use crate::config::RouteConfig;
use crate::error::GatewayError;
use crate::http::request::{RequestContext, RequestId, X_REQUEST_ID};
use crate::routing::forwarded_path;
use crate::security::headers::{append_forwarded, strip_hop_by_hop};
use crate::upstream::client::UpstreamClient;
use crate::upstream::error::UpstreamError;
use crate::upstream::hooks::{ForwardHooks, TracingHooks};

/// Forwards requests to the backend of their matched route.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Arc<dyn UpstreamClient>,
    hooks: Arc<dyn ForwardHooks>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self::with_hooks(client, Arc::new(TracingHooks))
    }

    pub fn with_hooks(client: Arc<dyn UpstreamClient>, hooks: Arc<dyn ForwardHooks>) -> Self {
        Self { client, hooks }
    }

    /// Forward `request` to the route bound in `ctx`.
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
    ) -> Result<Response<Body>, GatewayError> {
        let route = ctx
            .matched_route()
            .ok_or_else(|| GatewayError::Internal("dispatch without a resolved route".to_string()))?;

        let mut upstream = match build_upstream_request(ctx, route, request) {
            Ok(upstream) => upstream,
            Err(error) => {
                self.hooks.on_failure(ctx, route, &error);
                return Err(error.into_gateway_error(&route.name));
            }
        };
        self.hooks.before_forward(ctx, route, &mut upstream);

        let mut in_flight = InFlight::new(ctx.request_id(), &route.name);
        let result = match tokio::time::timeout(route.timeout(), self.client.send(upstream)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Deadline(route.timeout())),
        };
        in_flight.finish();

        match result {
            Ok(mut response) => {
                strip_hop_by_hop(response.headers_mut());
                self.hooks.after_response(ctx, route, &response);
                Ok(response)
            }
            Err(error) => {
                self.hooks.on_failure(ctx, route, &error);
                Err(error.into_gateway_error(&route.name))
            }
        }
    }
}

/// Rewrite the inbound request for `route`'s target.
pub fn build_upstream_request(
    ctx: &RequestContext,
    route: &RouteConfig,
    request: Request<Body>,
) -> Result<Request<Body>, UpstreamError> {
    let (parts, body) = request.into_parts();

    let path_and_query = forwarded_path(route, ctx.path(), ctx.query());
    let uri: Uri = format!("{}{}", route.target.trim_end_matches('/'), path_and_query)
        .parse()
        .map_err(|e| UpstreamError::InvalidRequest(format!("bad upstream URI: {}", e)))?;
    let authority = uri
        .authority()
        .ok_or_else(|| UpstreamError::InvalidRequest("upstream URI has no authority".to_string()))?;
    let host = HeaderValue::from_str(authority.as_str())
        .map_err(|e| UpstreamError::InvalidRequest(format!("bad Host value: {}", e)))?;

    let mut headers = parts.headers;
    let original_host = headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);
    append_forwarded(&mut headers, ctx.client(), original_host);
    headers.insert(header::HOST, host);
    headers.insert(X_REQUEST_ID, ctx.request_id().header_value());

    let mut upstream = Request::new(body);
    *upstream.method_mut() = parts.method;
    *upstream.uri_mut() = uri;
    *upstream.version_mut() = Version::HTTP_11;
    *upstream.headers_mut() = headers;
    Ok(upstream)
}

/// Logs when an upstream call is abandoned before it completes, which
/// happens when the client disconnects and the handler future is dropped.
struct InFlight<'a> {
    request_id: &'a RequestId,
    service: &'a str,
    started: Instant,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn new(request_id: &'a RequestId, service: &'a str) -> Self {
        Self {
            request_id,
            service,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                request_id = %self.request_id,
                service = %self.service,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Client disconnected; upstream call cancelled"
            );
        }
    }
}
