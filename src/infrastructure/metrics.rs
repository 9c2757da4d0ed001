//! Metrics collection for the feed
//!
//! Lock-free counters updated by submitters and the writer thread.
//! Read back as a [`MetricsSnapshot`] for logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Feed metrics collector
///
/// Shared between every [`SheetFeed`](crate::SheetFeed) clone and the writer thread.
pub struct FeedMetrics {
    /// Calls to submit
    submitted: AtomicU64,
    /// Submissions that passed the rate limiter and reached the queue
    accepted: AtomicU64,
    /// Submissions rejected by the rate limiter
    rate_limited: AtomicU64,
    /// Accepted by the limiter but dropped (queue full or closed)
    dropped: AtomicU64,
    /// Snapshots the writer finished
    processed: AtomicU64,
    /// Passes aborted by a panic
    failed_passes: AtomicU64,
    /// Symbols or legs skipped because of an error
    leg_errors: AtomicU64,
    start_time: Instant,
}

/// Metrics snapshot for export
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub accepted: u64,
    pub rate_limited: u64,
    pub dropped: u64,
    pub processed: u64,
    pub failed_passes: u64,
    pub leg_errors: u64,
    pub passes_per_second: f64,
    pub uptime_seconds: u64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed_passes: AtomicU64::new(0),
            leg_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed_pass(&self) {
        self.failed_passes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_leg_errors(&self, count: u64) {
        if count > 0 {
            self.leg_errors.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            processed as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed,
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            leg_errors: self.leg_errors.load(Ordering::Relaxed),
            passes_per_second: rate,
            uptime_seconds: uptime,
        }
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}
