//! Response rendering.
//!
//! # Responsibilities
//! - Render the uniform error envelope `{error, message, requestId}`
//! - Stamp X-Request-ID and rate-limit quota headers
//! - Render the gateway's own health and info documents
//!
//! # Design Decisions
//! - Every failing stage goes through `error_response`, so the client-visible
//!   error shape never varies
//! - Rate-limit headers follow the IETF `RateLimit-*` draft names

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::security::Quota;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Uniform error body returned on every failure path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }
}

/// Render an error envelope with the given status.
pub fn render(status: StatusCode, kind: &str, message: &str, request_id: &RequestId) -> Response {
    let envelope = ErrorEnvelope::new(kind, message, request_id.as_str());
    let mut response = (status, Json(envelope)).into_response();
    response.headers_mut().insert(X_REQUEST_ID, request_id.header_value());
    response
}

/// Render a pipeline failure.
pub fn error_response(error: &GatewayError, request_id: &RequestId) -> Response {
    let mut response = render(error.status(), error.kind(), &error.client_message(), request_id);

    if let GatewayError::RateLimited {
        limit,
        retry_after_secs,
        ..
    } = error
    {
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(*limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(0u64));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(*retry_after_secs));
    }
    response
}

/// Advertise the remaining quota on an allowed response.
pub fn stamp_quota(response: &mut Response, quota: Quota) {
    let headers = response.headers_mut();
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(quota.reset_after_secs));
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub message: String,
    pub version: String,
    pub environment: String,
}

pub fn health_response(environment: &str) -> Response {
    let body = HealthStatus {
        status: "Healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: environment.to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn info_response(version: &str, environment: &str) -> Response {
    let body = GatewayInfo {
        message: "Welcome to API Gateway!".to_string(),
        version: version.to_string(),
        environment: environment.to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn envelope_of(response: Response) -> ErrorEnvelope {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_render_envelope() {
        let id = RequestId::from("req-1");
        let response = render(StatusCode::NOT_FOUND, "Not Found", "nothing here", &id);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[&X_REQUEST_ID], "req-1");
        assert_eq!(
            envelope_of(response).await,
            ErrorEnvelope::new("Not Found", "nothing here", "req-1")
        );
    }

    #[test]
    fn test_envelope_uses_request_id_key() {
        let json = serde_json::to_value(ErrorEnvelope::new("e", "m", "abc")).unwrap();
        assert_eq!(json["requestId"], "abc");
        assert!(json.get("request_id").is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_response_headers() {
        let error = GatewayError::RateLimited {
            scope: "route:orders".into(),
            message: "Orders service rate limit exceeded.".into(),
            limit: 50,
            retry_after_secs: 42,
        };
        let response = error_response(&error, &RequestId::from("req-2"));

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()[&RATELIMIT_LIMIT], "50");
        assert_eq!(response.headers()[&RATELIMIT_REMAINING], "0");

        let envelope = envelope_of(response).await;
        assert_eq!(envelope.error, "Too Many Requests");
        assert_eq!(envelope.message, "Orders service rate limit exceeded.");
        assert_eq!(envelope.request_id, "req-2");
    }
}
