use rustc_hash::FxHashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::NodeId;

/// Fixed-window rate limit for a single node.
///
/// The counter resets at fixed window boundaries; a node whose window is
/// exhausted is deferred by the engine, never failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per `window_ms` milliseconds.
    pub fn per_ms(max_requests: u32, window_ms: u64) -> Self {
        Self::new(max_requests, Duration::from_millis(window_ms))
    }
}

/// Per-node fixed-window counters.
///
/// Uses `tokio::time::Instant` so a paused test clock drives window resets
/// the same way it drives timeouts and backoff.
#[derive(Debug, Default)]
pub(crate) struct RateLimiter {
    windows: FxHashMap<NodeId, Window>,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    /// Try to take one slot from the node's current window. Returns `false`
    /// when the window is exhausted; the caller defers the node.
    pub(crate) fn try_acquire(&mut self, node: &NodeId, limit: RateLimit) -> bool {
        let now = Instant::now();
        let window = self.windows.entry(node.clone()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= limit.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < limit.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn forget(&mut self, node: &NodeId) {
        self.windows.remove(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sixth_call_deferred_until_window_resets() {
        let mut limiter = RateLimiter::default();
        let node = NodeId::from("sender");
        let limit = RateLimit::per_ms(5, 1000);

        for _ in 0..5 {
            assert!(limiter.try_acquire(&node, limit));
        }
        assert!(!limiter.try_acquire(&node, limit));

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(limiter.try_acquire(&node, limit));
    }

    #[tokio::test(start_paused = true)]
    async fn windows_are_per_node() {
        let mut limiter = RateLimiter::default();
        let limit = RateLimit::per_ms(1, 1000);

        assert!(limiter.try_acquire(&NodeId::from("a"), limit));
        assert!(!limiter.try_acquire(&NodeId::from("a"), limit));
        assert!(limiter.try_acquire(&NodeId::from("b"), limit));
    }
}
