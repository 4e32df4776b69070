//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, RateLimitPolicy};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "GATEWAY_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying environment
/// overrides from the process environment.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finalize(config, |var| std::env::var(var).ok())
}

/// Apply environment overrides to an already-parsed config and validate it.
pub fn finalize<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay `GATEWAY_*` variables onto the config.
///
/// Route-scoped variables use the route name upper-cased with `-` replaced by
/// `_`, e.g. `GATEWAY_ORDERS_TARGET`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| format!("{ENV_PREFIX}{suffix}");

    if let Some(address) = lookup(&var("BIND_ADDRESS")) {
        config.listener.bind_address = address;
    }
    if let Some(port) = parsed::<u16, _>(lookup, &var("PORT"))? {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    if let Some(environment) = lookup(&var("ENV")) {
        config.gateway.environment = environment;
    }
    if let Some(size) = parsed::<u64, _>(lookup, &var("MAX_PAYLOAD_SIZE"))? {
        config.gateway.max_payload_size = Some(size);
    }
    if let Some(level) = lookup(&var("LOG_LEVEL")) {
        config.observability.log_level = level;
    }

    for route in &mut config.routes {
        let scope = route.name.to_uppercase().replace('-', "_");
        let route_var = |suffix: &str| var(&format!("{scope}_{suffix}"));

        if let Some(enabled) = parsed::<bool, _>(lookup, &route_var("ENABLED"))? {
            route.enabled = enabled;
        }
        if let Some(target) = lookup(&route_var("TARGET")) {
            route.target = target;
        }
        if let Some(timeout) = parsed::<u64, _>(lookup, &route_var("TIMEOUT_MS"))? {
            route.timeout_ms = timeout;
        }

        let window = parsed::<u64, _>(lookup, &route_var("RATE_LIMIT_WINDOW_MS"))?;
        let max = parsed::<u64, _>(lookup, &route_var("RATE_LIMIT_MAX"))?;
        if window.is_some() || max.is_some() {
            let policy = route
                .rate_limit
                .get_or_insert_with(|| RateLimitPolicy::new(60_000, 50));
            if let Some(window) = window {
                policy.window_ms = window;
            }
            if let Some(max) = max {
                policy.max_requests = max;
            }
        }
    }

    Ok(())
}

fn parsed<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Env {
            var: var.to_string(),
            value,
        }),
    }
}
