//! Per-request orchestration.
//!
//! # Data Flow
//! ```text
//! RECEIVED → IDENTIFIED → GLOBAL_RATE_CHECKED → VALIDATED → ROUTE_RESOLVED
//!          → ROUTE_RATE_CHECKED → DISPATCHED → COMPLETED
//!
//! Health checks:  RECEIVED → IDENTIFIED → COMPLETED
//! Any stage:      → FAILED (error envelope, no later stage runs)
//! ```
//!
//! # Design Decisions
//! - Stages run sequentially inside the request's task
//! - A panic anywhere in the stages becomes a 500 envelope
//! - The response always carries X-Request-ID, whatever the outcome

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::config::validation::HEALTH_PATH;
use crate::config::{GatewayConfig, GatewaySettings, RateLimitPolicy, RouteConfig};
use crate::error::GatewayError;
use crate::http::request::{RequestContext, RequestId, X_REQUEST_ID};
use crate::http::response::{error_response, health_response, info_response, stamp_quota};
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::headers::client_identity;
use crate::security::{Quota, RateDecision, RateLimitKey, RateLimiter, RequestValidator};
use crate::upstream::{Dispatcher, UpstreamClient};

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Received,
    Identified,
    GlobalRateChecked,
    Validated,
    RouteResolved,
    RouteRateChecked,
    Dispatched,
    Completed,
    Failed,
}

impl Stage {
    /// The stage a request enters after this one succeeds.
    pub fn next(self) -> Stage {
        match self {
            Stage::Received => Stage::Identified,
            Stage::Identified => Stage::GlobalRateChecked,
            Stage::GlobalRateChecked => Stage::Validated,
            Stage::Validated => Stage::RouteResolved,
            Stage::RouteResolved => Stage::RouteRateChecked,
            Stage::RouteRateChecked => Stage::Dispatched,
            Stage::Dispatched => Stage::Completed,
            Stage::Completed => Stage::Completed,
            Stage::Failed => Stage::Failed,
        }
    }

    fn from_u8(value: u8) -> Stage {
        match value {
            0 => Stage::Received,
            1 => Stage::Identified,
            2 => Stage::GlobalRateChecked,
            3 => Stage::Validated,
            4 => Stage::RouteResolved,
            5 => Stage::RouteRateChecked,
            6 => Stage::Dispatched,
            7 => Stage::Completed,
            _ => Stage::Failed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::Identified => "IDENTIFIED",
            Stage::GlobalRateChecked => "GLOBAL_RATE_CHECKED",
            Stage::Validated => "VALIDATED",
            Stage::RouteResolved => "ROUTE_RESOLVED",
            Stage::RouteRateChecked => "ROUTE_RATE_CHECKED",
            Stage::Dispatched => "DISPATCHED",
            Stage::Completed => "COMPLETED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Last stage a request completed. Readable after a panic unwinds the
/// stage future.
#[derive(Debug)]
pub struct StageCursor(AtomicU8);

impl StageCursor {
    pub fn new() -> Self {
        Self(AtomicU8::new(Stage::Received as u8))
    }

    pub fn advance(&self, to: Stage) {
        self.0.store(to as u8, Ordering::Relaxed);
    }

    pub fn current(&self) -> Stage {
        Stage::from_u8(self.0.load(Ordering::Relaxed))
    }

    /// Mark the request failed. Returns the stage that was being attempted.
    pub fn fail(&self) -> Stage {
        let attempted = self.current().next();
        self.advance(Stage::Failed);
        attempted
    }
}

impl Default for StageCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// A request the pipeline answered.
struct Served {
    response: Response,
    route: Option<Arc<RouteConfig>>,
}

/// A request a stage refused.
struct Rejected {
    error: GatewayError,
    route: Option<Arc<RouteConfig>>,
}

impl Rejected {
    fn routed(route: &Arc<RouteConfig>, error: GatewayError) -> Self {
        Self {
            error,
            route: Some(route.clone()),
        }
    }
}

impl From<GatewayError> for Rejected {
    fn from(error: GatewayError) -> Self {
        Self { error, route: None }
    }
}

/// The gateway's request pipeline, shared by every connection.
#[derive(Debug)]
pub struct Pipeline {
    routes: RouteTable,
    limiter: Arc<RateLimiter>,
    global_limit: Option<RateLimitPolicy>,
    validator: RequestValidator,
    dispatcher: Dispatcher,
    settings: GatewaySettings,
}

impl Pipeline {
    pub fn new(config: &GatewayConfig, client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            routes: RouteTable::from_config(&config.routes),
            limiter: Arc::new(RateLimiter::new()),
            global_limit: config.gateway.rate_limit.clone(),
            validator: RequestValidator::new(config.gateway.max_payload_size),
            dispatcher: Dispatcher::new(client),
            settings: config.gateway.clone(),
        }
    }

    /// Window table shared with the background sweeper.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run one request through every stage and produce the client response.
    pub async fn handle(&self, peer: SocketAddr, request: Request<Body>) -> Response {
        let client = client_identity(request.headers(), peer.ip(), self.settings.trust_forwarded_for);
        let cursor = StageCursor::new();
        let ctx = RequestContext::identify(&request, client);
        cursor.advance(Stage::Identified);

        let request_id = ctx.request_id().clone();
        let method = ctx.method().clone();
        let started = ctx.received_at();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %ctx.path()
        );

        async move {
            tracing::debug!(client = %client, "Request received");

            let outcome = AssertUnwindSafe(self.run(ctx, request, &cursor))
                .catch_unwind()
                .await;

            let (mut response, route) = match outcome {
                Ok(Ok(served)) => {
                    cursor.advance(Stage::Completed);
                    (served.response, served.route)
                }
                Ok(Err(rejected)) => {
                    log_failure(cursor.fail(), &request_id, &rejected.error);
                    (error_response(&rejected.error, &request_id), rejected.route)
                }
                Err(panic) => {
                    let error = GatewayError::Internal(panic_message(panic.as_ref()));
                    log_failure(cursor.fail(), &request_id, &error);
                    (error_response(&error, &request_id), None)
                }
            };

            response.headers_mut().insert(X_REQUEST_ID, request_id.header_value());

            let route_label = route.as_deref().map(|r| r.name.as_str()).unwrap_or("none");
            let status = response.status().as_u16();
            metrics::record_request(method.as_str(), status, route_label, started);
            tracing::info!(
                status,
                route = route_label,
                latency_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );

            response
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        ctx: RequestContext,
        request: Request<Body>,
        cursor: &StageCursor,
    ) -> Result<Served, Rejected> {
        if is_health_check(ctx.method(), ctx.path()) {
            return Ok(Served {
                response: health_response(&self.settings.environment),
                route: None,
            });
        }

        let global_quota = match &self.global_limit {
            Some(policy) => Some(self.check_rate(RateLimitKey::global(ctx.client()), policy)?),
            None => None,
        };
        cursor.advance(Stage::GlobalRateChecked);

        self.validator.validate(ctx.method(), request.headers())?;
        cursor.advance(Stage::Validated);

        let route = match self.routes.resolve(ctx.path()) {
            Some(route) => route.clone(),
            None if *ctx.method() == Method::GET && ctx.path() == "/" => {
                return Ok(Served {
                    response: info_response(&self.settings.version, &self.settings.environment),
                    route: None,
                });
            }
            None => {
                return Err(GatewayError::RouteNotFound {
                    path: ctx.path().to_string(),
                }
                .into());
            }
        };
        let ctx = ctx.with_route(route.clone());
        cursor.advance(Stage::RouteResolved);

        let route_quota = match &route.rate_limit {
            Some(policy) => Some(
                self.check_rate(RateLimitKey::route(ctx.client(), &route.name), policy)
                    .map_err(|e| Rejected::routed(&route, e))?,
            ),
            None => None,
        };
        cursor.advance(Stage::RouteRateChecked);

        let mut response = self
            .dispatcher
            .dispatch(&ctx, request)
            .await
            .map_err(|e| Rejected::routed(&route, e))?;
        cursor.advance(Stage::Dispatched);

        // The innermost layer that admitted the request speaks for the quota.
        if let Some(quota) = route_quota.or(global_quota) {
            stamp_quota(&mut response, quota);
        }

        Ok(Served {
            response,
            route: Some(route),
        })
    }

    fn check_rate(&self, key: RateLimitKey, policy: &RateLimitPolicy) -> Result<Quota, GatewayError> {
        let scope = key.scope().to_string();
        match self.limiter.check(key, policy) {
            RateDecision::Allow(quota) => Ok(quota),
            RateDecision::Deny {
                limit,
                retry_after_secs,
            } => {
                metrics::record_rate_limited(&scope);
                Err(GatewayError::RateLimited {
                    scope,
                    message: policy.message.clone(),
                    limit,
                    retry_after_secs,
                })
            }
        }
    }
}

fn is_health_check(method: &Method, path: &str) -> bool {
    path == HEALTH_PATH && (*method == Method::GET || *method == Method::HEAD)
}

fn log_failure(stage: Stage, request_id: &RequestId, error: &GatewayError) {
    if error.is_client_error() {
        tracing::warn!(stage = %stage, request_id = %request_id, error = %error, "Request rejected");
    } else {
        tracing::error!(stage = %stage, request_id = %request_id, error = %error, "Request failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}
