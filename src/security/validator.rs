//! Pre-dispatch request validation.
//!
//! # Responsibilities
//! - Require a Content-Type on mutating requests
//! - Reject declared bodies above the configured maximum
//!
//! # Design Decisions
//! - Only POST, PUT and PATCH are checked; other methods pass through
//! - Checks run on headers only, before any upstream I/O
//! - An unparseable Content-Length is left for the backend to reject

use axum::http::{header, HeaderMap, Method};

use crate::error::GatewayError;

/// Structural checks applied before a request is dispatched.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    max_payload_size: Option<u64>,
}

impl RequestValidator {
    pub fn new(max_payload_size: Option<u64>) -> Self {
        Self { max_payload_size }
    }

    pub fn validate(&self, method: &Method, headers: &HeaderMap) -> Result<(), GatewayError> {
        if !is_mutating(method) {
            return Ok(());
        }

        let has_content_type = headers
            .get(header::CONTENT_TYPE)
            .is_some_and(|value| !value.as_bytes().is_empty());
        if !has_content_type {
            return Err(GatewayError::MissingContentType);
        }

        if let Some(limit) = self.max_payload_size {
            let declared = headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            if let Some(declared) = declared.filter(|&len| len > limit) {
                return Err(GatewayError::PayloadTooLarge { declared, limit });
            }
        }

        Ok(())
    }
}

/// Create/update/patch-style verbs.
pub fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}
