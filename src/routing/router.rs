//! Route lookup.
//!
//! # Responsibilities
//! - Store the enabled routes in registration order
//! - Look up the route for an inbound path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - First registered match wins
//! - Disabled routes never enter the table

use std::sync::Arc;

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

#[derive(Debug)]
struct RouteEntry {
    matcher: PathPrefixMatcher,
    route: Arc<RouteConfig>,
}

/// Maps inbound paths to the backend service that owns them.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build the table from configuration, skipping disabled routes.
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let entries = routes
            .iter()
            .filter(|route| route.enabled)
            .map(|route| {
                tracing::info!(
                    service = %route.name,
                    mount_prefix = %route.mount_prefix,
                    target = %route.target,
                    "Service registered"
                );
                RouteEntry {
                    matcher: PathPrefixMatcher::new(route.mount_prefix.as_str()),
                    route: Arc::new(route.clone()),
                }
            })
            .collect();

        Self { entries }
    }

    /// Resolve the route owning `path`.
    pub fn resolve(&self, path: &str) -> Option<&Arc<RouteConfig>> {
        self.entries
            .iter()
            .find(|entry| entry.matcher.matches(path))
            .map(|entry| &entry.route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
