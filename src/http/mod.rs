//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info, graceful shutdown)
//!     → pipeline.rs (stage orchestration)
//!         → request.rs (correlation ID, request context)
//!         → [security: rate limits, validation]
//!         → [routing: route table lookup]
//!         → [upstream: dispatch]
//!     → response.rs (error envelope, quota headers)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Pipeline, Stage};
pub use request::{RequestContext, RequestId, X_REQUEST_ID};
pub use response::ErrorEnvelope;
pub use server::HttpServer;
