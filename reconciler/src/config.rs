//! Reconciler tuning: fetch timeout and concurrency bounds.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Upper bound for a single gap fetch; on expiry the gap fails with `SyncError::Timeout`.
    pub fetch_timeout: Duration,
    /// Gap fetches in flight per channel.
    pub max_concurrent_fetches: usize,
    /// Channels reconciled at once by `reconcile_many` / `sync_channels`.
    pub max_concurrent_channels: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_concurrent_fetches: 4,
            max_concurrent_channels: 4,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, n: usize) -> Self {
        self.max_concurrent_fetches = n.max(1);
        self
    }

    pub fn with_max_concurrent_channels(mut self, n: usize) -> Self {
        self.max_concurrent_channels = n.max(1);
        self
    }
}
