//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request path against a mount prefix
//! - Split the matched path into prefix and forwarded remainder
//! - Detect overlapping prefixes at config time
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefixes match on segment boundaries: `/orders` matches `/orders/7`
//!   but not `/ordersx`
//! - No regex to guarantee O(n) matching

/// Strip `prefix` from `path` if the path lies under it.
///
/// Returns the remainder that is forwarded upstream, which is always rooted
/// (`/` when the path equals the prefix). Trailing slashes on the prefix are
/// ignored.
pub fn strip_mount<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Matches the request path against a mount prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are dropped.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Returns true if the path lies under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        strip_mount(&self.prefix, path).is_some()
    }

    /// True when either prefix would capture paths of the other.
    pub fn overlaps(&self, other: &PathPrefixMatcher) -> bool {
        self.matches(&other.prefix) || other.matches(&self.prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }
}
