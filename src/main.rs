//! API Gateway
//!
//! A single entry point in front of independently deployed backend services,
//! built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     API GATEWAY                      │
//!                      │                                                      │
//!   Client Request     │  ┌────────┐   ┌──────────┐   ┌──────────┐            │
//!   ───────────────────┼─▶│  http  │──▶│ security │──▶│ routing  │            │
//!                      │  │ server │   │ limits + │   │  table   │            │
//!                      │  └────────┘   │ validate │   └────┬─────┘            │
//!                      │               └──────────┘        │                  │
//!                      │                                   ▼                  │
//!   Client Response    │  ┌────────┐                 ┌──────────┐            │
//!   ◀──────────────────┼──│response│◀────────────────│ upstream │◀───────────┼── Backend
//!                      │  │envelope│                 │dispatcher│            │   Service
//!                      │  └────────┘                 └──────────┘            │
//!                      │                                                      │
//!                      │  Cross-cutting: config, observability, lifecycle     │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, loader, ConfigError, GatewayConfig};
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::HttpServer;

const DEFAULT_CONFIG: &str = "gateway.toml";

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP API gateway", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, used_defaults) = resolve_config(&cli.config)?;

    logging::init_logging(&config.observability)?;

    if used_defaults {
        tracing::warn!(
            path = %cli.config.display(),
            "Config file not found, using built-in defaults"
        );
    }

    tracing::info!(
        version = %config.gateway.version,
        environment = %config.gateway.environment,
        bind_address = %config.listener.bind_address,
        routes = config.routes.iter().filter(|r| r.enabled).count(),
        "Configuration loaded"
    );

    if cli.check {
        println!("Configuration OK: {}", cli.config.display());
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let receiver = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::forward_signals(&signal_shutdown).await;
    });

    let server = HttpServer::new(config);
    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the config file. Only the default path may be absent, in which case
/// the built-in defaults (plus environment overrides) are used.
fn resolve_config(path: &Path) -> Result<(GatewayConfig, bool), ConfigError> {
    match load_config(path) {
        Ok(config) => Ok((config, false)),
        Err(ConfigError::Io(e))
            if e.kind() == std::io::ErrorKind::NotFound && path.as_os_str() == DEFAULT_CONFIG =>
        {
            let config = loader::finalize(GatewayConfig::default(), |var| std::env::var(var).ok())?;
            Ok((config, true))
        }
        Err(e) => Err(e),
    }
}
