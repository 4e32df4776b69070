//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Gateway-wide policy (environment, payload limit, global rate limit).
    pub gateway: GatewaySettings,

    /// Backend services, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Gateway-wide settings shared by every route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Deployment environment reported by `/` and `/health`.
    pub environment: String,

    /// Version string reported by `/`.
    pub version: String,

    /// Maximum declared Content-Length for mutating requests, in bytes.
    /// `None` disables the size check.
    pub max_payload_size: Option<u64>,

    /// Derive the client identity from `X-Forwarded-For` (one trusted hop).
    pub trust_forwarded_for: bool,

    /// How often stale rate-limit windows are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Global rate limit applied before route resolution.
    pub rate_limit: Option<RateLimitPolicy>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_payload_size: Some(10 * 1024 * 1024), // 10MB
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
            rate_limit: Some(RateLimitPolicy {
                window_ms: 60_000,
                max_requests: 100,
                message: default_rate_limit_message(),
            }),
        }
    }
}

/// A backend service exposed under a mount prefix.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics. Unique.
    pub name: String,

    /// Disabled routes are never registered.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Backend base URL (e.g., "http://localhost:8000").
    pub target: String,

    /// Public path prefix (e.g., "/orders").
    pub mount_prefix: String,

    /// Prefix prepended to the forwarded path (e.g., "/api/v1"). May be empty.
    #[serde(default)]
    pub base_path_rewrite: String,

    /// Upper bound on the upstream round trip, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-route rate limit, checked after the global one.
    #[serde(default)]
    pub rate_limit: Option<RateLimitPolicy>,
}

impl RouteConfig {
    /// Convenience constructor with defaults for the optional fields.
    pub fn new(
        name: impl Into<String>,
        mount_prefix: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            target: target.into(),
            mount_prefix: mount_prefix.into(),
            base_path_rewrite: String::new(),
            timeout_ms: default_timeout_ms(),
            rate_limit: None,
        }
    }

    /// The upstream deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Fixed-window rate-limit policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per window.
    pub max_requests: u64,

    /// Message placed in the 429 envelope.
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

impl RateLimitPolicy {
    pub fn new(window_ms: u64, max_requests: u64) -> Self {
        Self {
            window_ms,
            max_requests,
            message: default_rate_limit_message(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_rate_limit_message() -> String {
    "Rate limit exceeded. Try again later.".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
