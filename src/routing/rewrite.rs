//! Upstream path rewriting.
//!
//! The forwarded path is `base_path_rewrite + (path minus mount prefix)`,
//! with runs of `/` collapsed. The query string is carried over untouched.

use crate::config::RouteConfig;
use crate::routing::matcher::strip_mount;

/// Build the path-and-query forwarded to the route's target.
///
/// A path outside the route's mount prefix is forwarded whole.
pub fn forwarded_path(route: &RouteConfig, path: &str, query: Option<&str>) -> String {
    let remainder = strip_mount(&route.mount_prefix, path).unwrap_or(path);
    let mut forwarded = collapse_slashes(&format!("{}{}", route.base_path_rewrite, remainder));

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        forwarded.push('?');
        forwarded.push_str(query);
    }
    forwarded
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }
    out
}
