//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup, registration order)
//!     → matcher.rs (segment-aware prefix match)
//!     → Return: matched RouteConfig or NoMatch
//!
//! Forwarding:
//!     RouteConfig + path + query
//!     → rewrite.rs (strip mount prefix, prepend base path, collapse slashes)
//! ```
//!
//! # Design Decisions
//! - Routes built at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First registered match wins

pub mod matcher;
pub mod rewrite;
pub mod router;

pub use rewrite::forwarded_path;
pub use router::RouteTable;
