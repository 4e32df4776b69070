//! Fixed-window rate limiting.
//!
//! Windows are keyed by client identity and scope (global, or a route name),
//! so the global and per-route layers never share counters.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitPolicy;

/// Which layer a window belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Route(String),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Route(name) => write!(f, "route:{}", name),
        }
    }
}

/// Composite key of client identity and scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    client: IpAddr,
    scope: Scope,
}

impl RateLimitKey {
    pub fn global(client: IpAddr) -> Self {
        Self {
            client,
            scope: Scope::Global,
        }
    }

    pub fn route(client: IpAddr, route: &str) -> Self {
        Self {
            client,
            scope: Scope::Route(route.to_string()),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[derive(Debug)]
struct RateLimitWindow {
    count: u64,
    window_start: Instant,
    length: Duration,
}

/// Quota left after an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    pub reset_after_secs: u64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow(Quota),
    Deny { limit: u64, retry_after_secs: u64 },
}

/// Shared window table for every rate-limit layer.
///
/// Each check runs under the key's shard lock, so concurrent requests sharing
/// a key never lose an increment.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<RateLimitKey, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `key` at the current instant.
    pub fn check(&self, key: RateLimitKey, policy: &RateLimitPolicy) -> RateDecision {
        self.check_at(key, policy, Instant::now())
    }

    /// Count a request against `key` as of `now`.
    pub fn check_at(&self, key: RateLimitKey, policy: &RateLimitPolicy, now: Instant) -> RateDecision {
        let length = policy.window();
        let mut window = self.windows.entry(key).or_insert_with(|| RateLimitWindow {
            count: 0,
            window_start: now,
            length,
        });

        if now.saturating_duration_since(window.window_start) >= length {
            window.window_start = now;
            window.count = 0;
        }
        window.length = length;

        // Denied requests still count, but the counter stops one past the limit.
        window.count = (window.count + 1).min(policy.max_requests.saturating_add(1));

        let reset_after = (window.window_start + length).saturating_duration_since(now);
        let reset_after_secs = ceil_secs(reset_after);

        if window.count > policy.max_requests {
            RateDecision::Deny {
                limit: policy.max_requests,
                retry_after_secs: reset_after_secs,
            }
        } else {
            RateDecision::Allow(Quota {
                limit: policy.max_requests,
                remaining: policy.max_requests - window.count,
                reset_after_secs,
            })
        }
    }

    /// Drop every window whose period has fully elapsed. Returns how many
    /// were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.window_start) < window.length);
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_nanos().div_ceil(1_000_000_000) as u64
}

/// Periodically sweep stale windows until shutdown.
pub async fn run_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, live = limiter.len(), "Swept stale rate-limit windows");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate-limit sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
