//! Request counters
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; values are exact once requests have finished

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Engine-wide counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests_handled: AtomicU64,
    requests_failed: AtomicU64,
    routes_not_found: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_handled: u64,
    pub requests_failed: u64,
    pub routes_not_found: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failures(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_not_found(&self) {
        self.routes_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            routes_not_found: self.routes_not_found.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = MetricsRegistry::new();
        metrics.increment_requests();
        metrics.increment_requests();
        metrics.increment_failures();
        metrics.increment_rollbacks();

        let snap = metrics.snapshot();
        assert_eq!(snap.requests_handled, 2);
        assert_eq!(snap.requests_failed, 1);
        assert_eq!(snap.transactions_rolled_back, 1);
        assert_eq!(snap.transactions_committed, 0);
    }
}
