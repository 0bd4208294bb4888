//! Global atomic counters for reconciliation runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    repositories_scanned: AtomicU64,
    items_fetched: AtomicU64,
    items_added: AtomicU64,
    write_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            repositories_scanned: AtomicU64::new(0),
            items_fetched: AtomicU64::new(0),
            items_added: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_repositories_scanned(&self) {
        self.repositories_scanned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repositories_scanned", "counter incremented");
    }

    /// Add `n` to the items-fetched counter.
    pub fn add_items_fetched(&self, n: u64) {
        self.items_fetched.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "items_fetched", by = n, "counter incremented");
    }

    pub fn inc_items_added(&self) {
        self.items_added.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "items_added", "counter incremented");
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "write_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            repositories_scanned = self.repositories_scanned(),
            items_fetched = self.items_fetched(),
            items_added = self.items_added(),
            write_failures = self.write_failures(),
        );
    }

    pub fn repositories_scanned(&self) -> u64 {
        self.repositories_scanned.load(Ordering::Relaxed)
    }

    pub fn items_fetched(&self) -> u64 {
        self.items_fetched.load(Ordering::Relaxed)
    }

    pub fn items_added(&self) -> u64 {
        self.items_added.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.repositories_scanned.store(0, Ordering::Relaxed);
        self.items_fetched.store(0, Ordering::Relaxed);
        self.items_added.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
    }
}
