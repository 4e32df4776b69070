//! Gateway error taxonomy.
//!
//! Every stage that terminates a request does so with a [`GatewayError`];
//! the error decides the status code, the envelope `error` field and the
//! client-facing message. Causes stay in the logs.

use axum::http::StatusCode;
use thiserror::Error;

/// Failure that ends a request in the pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Mutating request without a Content-Type.
    #[error("missing Content-Type header")]
    MissingContentType,

    /// Declared Content-Length above the configured maximum.
    #[error("declared payload of {declared} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { declared: u64, limit: u64 },

    /// A rate-limit window is exhausted.
    #[error("{scope} rate limit exceeded")]
    RateLimited {
        scope: String,
        message: String,
        limit: u64,
        retry_after_secs: u64,
    },

    /// No route owns the path.
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    /// Deadline exceeded or the connection dropped mid-flight.
    #[error("{service} timed out: {cause}")]
    UpstreamTimeout { service: String, cause: String },

    /// Connection refused or name resolution failed.
    #[error("{service} unreachable: {cause}")]
    UpstreamUnreachable { service: String, cause: String },

    /// Any other transport failure.
    #[error("{service} transport failure: {cause}")]
    UpstreamFailed { service: String, cause: String },

    /// Bug or resource exhaustion inside the gateway.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingContentType => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnreachable { .. } | GatewayError::UpstreamFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The envelope's `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingContentType => "Bad Request",
            GatewayError::PayloadTooLarge { .. } => "Payload Too Large",
            GatewayError::RateLimited { .. } => "Too Many Requests",
            GatewayError::RouteNotFound { .. } => "Not Found",
            GatewayError::UpstreamTimeout { .. } => "Gateway Timeout",
            GatewayError::UpstreamUnreachable { .. } | GatewayError::UpstreamFailed { .. } => "Bad Gateway",
            GatewayError::Internal(_) => "Internal Server Error",
        }
    }

    /// The envelope's `message` field. Never includes internal causes.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::MissingContentType => "Missing Content-Type".to_string(),
            GatewayError::PayloadTooLarge { limit, .. } => {
                format!("Payload too large (max {} bytes)", limit)
            }
            GatewayError::RateLimited { message, .. } => message.clone(),
            GatewayError::RouteNotFound { .. } => "The requested resource does not exist".to_string(),
            GatewayError::UpstreamTimeout { service, .. } => {
                format!("{} service took too long to respond.", service)
            }
            GatewayError::UpstreamUnreachable { service, .. } => {
                format!("{} service is currently unreachable", service)
            }
            GatewayError::UpstreamFailed { .. } => {
                "An unexpected error occurred while proxying the request".to_string()
            }
            GatewayError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}
