//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight requests drain
//!             → background sweeper exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, logging, metrics, then listener
//! - Listener starts last (traffic only when ready)

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
