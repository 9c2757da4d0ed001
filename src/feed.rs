//! Data submission interface
//!
//! Callers on any thread hand snapshots to [`SheetFeed::submit`]. A
//! submission arriving sooner than the configured interval after the last
//! accepted one is dropped; accepted snapshots go onto a bounded queue
//! without blocking. Nothing is ever reported back to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::Level;

use crate::core::{FuturesData, MarketData, OptionsData, Snapshot};
use crate::infrastructure::metrics::FeedMetrics;
use crate::log_feed;

/// Minimum-interval gate shared by every submitter
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: Mutex::new(None),
        }
    }

    /// Accept at `now` if the interval has elapsed since the last acceptance
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = self.last_accepted.lock();
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Cloneable handle for submitting snapshots to the writer
#[derive(Clone)]
pub struct SheetFeed {
    sender: Sender<Snapshot>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<FeedMetrics>,
}

impl SheetFeed {
    /// Create a feed and the receiving end of its queue
    pub fn channel(
        interval: Duration,
        capacity: usize,
        metrics: Arc<FeedMetrics>,
    ) -> (Self, Receiver<Snapshot>) {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        let feed = Self {
            sender,
            limiter: Arc::new(RateLimiter::new(interval)),
            metrics,
        };
        (feed, receiver)
    }

    /// Submit one snapshot
    ///
    /// Fire-and-forget: rate-limited, full or closed queues drop the data
    /// and log; the caller never sees an error.
    pub fn submit(&self, market_data: MarketData, futures_data: FuturesData, options_data: OptionsData) {
        self.submit_at(
            Snapshot::new(market_data, futures_data, options_data),
            Instant::now(),
        );
    }

    /// Submit an already assembled snapshot
    pub fn submit_snapshot(&self, snapshot: Snapshot) {
        self.submit_at(snapshot, Instant::now());
    }

    /// Submit as if called at `now`
    pub fn submit_at(&self, snapshot: Snapshot, now: Instant) -> bool {
        self.metrics.record_submitted();

        if !self.limiter.try_acquire_at(now) {
            self.metrics.record_rate_limited();
            return false;
        }

        match self.sender.try_send(snapshot) {
            Ok(()) => {
                self.metrics.record_accepted();
                true
            }
            Err(TrySendError::Full(snapshot)) => {
                self.metrics.record_dropped();
                log_feed!(Level::WARN, quotes = snapshot.quote_count(), "Snapshot queue full, dropping snapshot");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.record_dropped();
                log_feed!(Level::ERROR, "Sheet writer stopped, dropping snapshot");
                false
            }
        }
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }
}
