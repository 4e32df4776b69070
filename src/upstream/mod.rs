//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (route bound) + inbound request
//!     → dispatcher.rs (rewrite path & headers)
//!     → hooks.rs before_forward
//!     → client.rs (send, under the route deadline)
//!     → hooks.rs after_response | on_failure
//!     → error.rs (classify transport failure → 502 / 504)
//! ```
//!
//! # Design Decisions
//! - The HTTP client is a trait so the pipeline can be exercised without
//!   sockets
//! - Failures are classified by walking the error source chain

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod hooks;

pub use client::{HyperClient, UpstreamClient};
pub use dispatcher::Dispatcher;
pub use error::{FailureClass, UpstreamError};
pub use hooks::{ForwardHooks, TracingHooks};
