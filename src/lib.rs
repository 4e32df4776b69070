//! HTTP API gateway library.
//!
//! Every request runs through one pipeline: correlation ID, global rate
//! limit, validation, route resolution, per-route rate limit, dispatch to the
//! backend that owns the path, and a uniform error envelope on failure.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
