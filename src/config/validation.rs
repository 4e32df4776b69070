//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0)
//! - Validate targets are absolute http URLs
//! - Detect duplicate names and overlapping mount prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Only enabled routes take part in prefix overlap checks

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RateLimitPolicy, RouteConfig};
use crate::routing::matcher::PathPrefixMatcher;

/// Path served by the gateway itself; no route may claim it.
pub const HEALTH_PATH: &str = "/health";

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{route}': mount prefix '{prefix}' must start with '/' and not be '/'")]
    MountPrefix { route: String, prefix: String },

    #[error("route '{route}': mount prefix shadows the reserved /health path")]
    ReservedPrefix { route: String },

    #[error("routes '{first}' and '{second}' have overlapping mount prefixes")]
    OverlappingPrefix { first: String, second: String },

    #[error("route '{route}': base path rewrite '{rewrite}' must be empty or start with '/'")]
    BasePathRewrite { route: String, rewrite: String },

    #[error("route '{route}': invalid target '{target}': {reason}")]
    Target {
        route: String,
        target: String,
        reason: String,
    },

    #[error("route '{0}': timeout_ms must be greater than zero")]
    ZeroTimeout(String),

    #[error("{scope} rate limit: window_ms and max_requests must be greater than zero")]
    RateLimit { scope: String },

    #[error("gateway.max_payload_size must be greater than zero")]
    ZeroPayloadLimit,

    #[error("gateway.sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.gateway.max_payload_size == Some(0) {
        errors.push(ValidationError::ZeroPayloadLimit);
    }
    if config.gateway.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if let Some(policy) = &config.gateway.rate_limit {
        check_policy("global", policy, &mut errors);
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        check_route(route, &mut errors);
    }

    let enabled: Vec<(&RouteConfig, PathPrefixMatcher)> = config
        .routes
        .iter()
        .filter(|r| r.enabled && is_valid_prefix(&r.mount_prefix))
        .map(|r| (r, PathPrefixMatcher::new(r.mount_prefix.as_str())))
        .collect();
    for (i, (first, first_matcher)) in enabled.iter().enumerate() {
        for (second, second_matcher) in &enabled[i + 1..] {
            if first_matcher.overlaps(second_matcher) {
                errors.push(ValidationError::OverlappingPrefix {
                    first: first.name.clone(),
                    second: second.name.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix.starts_with('/') && !prefix.trim_end_matches('/').is_empty()
}

fn check_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if !is_valid_prefix(&route.mount_prefix) {
        errors.push(ValidationError::MountPrefix {
            route: route.name.clone(),
            prefix: route.mount_prefix.clone(),
        });
    } else {
        let matcher = PathPrefixMatcher::new(route.mount_prefix.as_str());
        if matcher.overlaps(&PathPrefixMatcher::new(HEALTH_PATH)) {
            errors.push(ValidationError::ReservedPrefix {
                route: route.name.clone(),
            });
        }
    }

    if !route.base_path_rewrite.is_empty() && !route.base_path_rewrite.starts_with('/') {
        errors.push(ValidationError::BasePathRewrite {
            route: route.name.clone(),
            rewrite: route.base_path_rewrite.clone(),
        });
    }

    if let Err(reason) = check_target(&route.target) {
        errors.push(ValidationError::Target {
            route: route.name.clone(),
            target: route.target.clone(),
            reason,
        });
    }

    if route.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout(route.name.clone()));
    }

    if let Some(policy) = &route.rate_limit {
        check_policy(&format!("route '{}'", route.name), policy, errors);
    }
}

fn check_target(target: &str) -> Result<(), String> {
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.path() != "/" || url.query().is_some() {
        return Err("target must not carry a path or query; use base_path_rewrite".to_string());
    }
    Ok(())
}

fn check_policy(scope: &str, policy: &RateLimitPolicy, errors: &mut Vec<ValidationError>) {
    if policy.window_ms == 0 || policy.max_requests == 0 {
        errors.push(ValidationError::RateLimit {
            scope: scope.to_string(),
        });
    }
}
