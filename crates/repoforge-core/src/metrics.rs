//! Global atomic counters for repoforge observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a job).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters; no allocations, no locking.
pub struct Metrics {
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    packages_ingested: AtomicU64,
    artifacts_published: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            packages_ingested: AtomicU64::new(0),
            artifacts_published: AtomicU64::new(0),
        }
    }

    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "jobs_completed", "counter incremented");
    }

    pub fn inc_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "jobs_failed", "counter incremented");
    }

    /// One per package folded into a definition.
    pub fn inc_packages_ingested(&self) {
        self.packages_ingested.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "packages_ingested", "counter incremented");
    }

    pub fn inc_artifacts_published(&self) {
        self.artifacts_published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_published", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a job, process exit)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            jobs_completed = self.jobs_completed(),
            jobs_failed = self.jobs_failed(),
            packages_ingested = self.packages_ingested(),
            artifacts_published = self.artifacts_published(),
        );
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn packages_ingested(&self) -> u64 {
        self.packages_ingested.load(Ordering::Relaxed)
    }

    pub fn artifacts_published(&self) -> u64 {
        self.artifacts_published.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.jobs_completed.store(0, Ordering::Relaxed);
        self.jobs_failed.store(0, Ordering::Relaxed);
        self.packages_ingested.store(0, Ordering::Relaxed);
        self.artifacts_published.store(0, Ordering::Relaxed);
    }
}
