//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client identity)
//!     → rate_limit.rs (global window per client)
//!     → validator.rs (content type, declared size)
//!     → [route resolution]
//!     → rate_limit.rs (per-route window per client)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to dispatcher
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure, before upstream I/O
//! - No trust in client input unless configured

pub mod headers;
pub mod rate_limit;
pub mod validator;

pub use rate_limit::{Quota, RateDecision, RateLimitKey, RateLimiter};
pub use validator::RequestValidator;
