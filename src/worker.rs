//! Dedicated writer thread
//!
//! The spreadsheet automation handle is not safe to drive from more than
//! one thread, so exactly one thread (`sheet-writer`) opens it, performs
//! every read, write and format call, and closes it. Other threads only
//! ever reach it through the [`SheetFeed`] queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::Level;

use crate::core::{Clock, Snapshot};
use crate::feed::SheetFeed;
use crate::greeks::GreeksEngine;
use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::FeedMetrics;
use crate::layout::SheetLayout;
use crate::log_sheet;
use crate::sheet::Spreadsheet;
use crate::writer::SheetWriter;
use crate::Result;

/// Loop settings copied out of [`Config`] for the writer thread
#[derive(Debug, Clone)]
struct WorkerSettings {
    poll_timeout: Duration,
    init_attempts: u32,
    init_retry_delay: Duration,
    strikes_per_block: u32,
    title: String,
}

impl WorkerSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            poll_timeout: config.poll_timeout(),
            init_attempts: config.feed.init_attempts.max(1),
            init_retry_delay: config.init_retry_delay(),
            strikes_per_block: config.layout.strikes_per_block,
            title: config.layout.title.clone(),
        }
    }
}

/// Handle to the running writer thread
///
/// Dropping the handle stops the thread the same way [`shutdown`](Self::shutdown) does.
pub struct SheetUpdater {
    feed: SheetFeed,
    metrics: Arc<FeedMetrics>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SheetUpdater {
    /// Spawn the writer thread
    ///
    /// `open_sheet` runs on the writer thread, once per initialization
    /// attempt, so the handle it returns never crosses threads.
    pub fn start<S, G, C, F>(config: &Config, open_sheet: F, greeks: G, clock: C) -> Result<Self>
    where
        S: Spreadsheet,
        G: GreeksEngine + Send + 'static,
        C: Clock + 'static,
        F: FnMut() -> Result<S> + Send + 'static,
    {
        let metrics = Arc::new(FeedMetrics::new());
        let (feed, receiver) = SheetFeed::channel(
            config.update_interval(),
            config.feed.queue_capacity,
            Arc::clone(&metrics),
        );
        let stop = Arc::new(AtomicBool::new(false));
        let settings = WorkerSettings::from_config(config);

        let worker = Worker {
            settings,
            receiver,
            stop: Arc::clone(&stop),
            metrics: Arc::clone(&metrics),
        };
        let handle = thread::Builder::new()
            .name("sheet-writer".to_string())
            .spawn(move || worker.run(open_sheet, greeks, clock))?;

        tracing::info!(
            target: "sheet",
            interval_ms = config.feed.update_interval_ms,
            queue_capacity = config.feed.queue_capacity,
            "Sheet writer thread started"
        );

        Ok(Self {
            feed,
            metrics,
            stop,
            handle: Some(handle),
        })
    }

    /// Submission handle; clone freely across threads
    #[inline]
    pub fn feed(&self) -> SheetFeed {
        self.feed.clone()
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    /// True while the writer thread is alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Raise the stop flag and wait for the writer to save and close
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(target: "sheet", "Sheet writer thread panicked");
            }
        }
    }
}

impl Drop for SheetUpdater {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// State moved onto the writer thread
struct Worker {
    settings: WorkerSettings,
    receiver: Receiver<Snapshot>,
    stop: Arc<AtomicBool>,
    metrics: Arc<FeedMetrics>,
}

impl Worker {
    fn run<S, G, C, F>(self, open_sheet: F, greeks: G, clock: C)
    where
        S: Spreadsheet,
        G: GreeksEngine,
        C: Clock,
        F: FnMut() -> Result<S>,
    {
        let Some(mut writer) = self.initialize(open_sheet, greeks) else {
            return;
        };

        while !self.stop.load(Ordering::Acquire) {
            match self.receiver.recv_timeout(self.settings.poll_timeout) {
                Ok(snapshot) => self.process(&mut writer, &snapshot, &clock),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!(target: "sheet", "All feeds dropped, stopping writer");
                    break;
                }
            }
        }

        let pending = self.receiver.len();
        if pending > 0 {
            tracing::info!(target: "sheet", pending, "Discarding queued snapshots on stop");
        }
        writer.close();
    }

    /// Open the spreadsheet and lay out the workbook, retrying on failure
    fn initialize<S, G, F>(&self, mut open_sheet: F, mut greeks: G) -> Option<SheetWriter<S, G>>
    where
        S: Spreadsheet,
        G: GreeksEngine,
        F: FnMut() -> Result<S>,
    {
        let attempts = self.settings.init_attempts;
        for attempt in 1..=attempts {
            if self.stop.load(Ordering::Acquire) {
                return None;
            }

            let error = match open_sheet() {
                Ok(sheet) => {
                    let mut writer = SheetWriter::new(
                        sheet,
                        greeks,
                        SheetLayout::new(self.settings.strikes_per_block),
                        self.settings.title.as_str(),
                    );
                    match writer.initialize() {
                        Ok(()) => {
                            log_sheet!(Level::INFO, attempt, "Spreadsheet initialized");
                            return Some(writer);
                        }
                        Err(e) => {
                            greeks = writer.abandon();
                            e
                        }
                    }
                }
                Err(e) => e,
            };

            tracing::warn!(target: "sheet", attempt, attempts, error = %error, "Spreadsheet initialization failed");
            if attempt < attempts && !self.sleep_unless_stopped(self.settings.init_retry_delay) {
                return None;
            }
        }

        log_sheet!(
            Level::ERROR,
            attempts,
            "Giving up on spreadsheet initialization, writer stopped"
        );
        None
    }

    /// Run one update pass inside a panic boundary
    fn process<S, G, C>(&self, writer: &mut SheetWriter<S, G>, snapshot: &Snapshot, clock: &C)
    where
        S: Spreadsheet,
        G: GreeksEngine,
        C: Clock,
    {
        let now = clock.now();
        match panic::catch_unwind(AssertUnwindSafe(|| writer.apply(snapshot, now))) {
            Ok(report) => {
                self.metrics.record_processed();
                self.metrics.record_leg_errors(report.errors as u64);
            }
            Err(payload) => {
                self.metrics.record_failed_pass();
                tracing::error!(
                    target: "sheet",
                    reason = panic_message(payload.as_ref()),
                    "Update pass aborted"
                );
            }
        }
    }

    /// Sleep for `delay`, waking early on stop; false if stopped
    fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.stop.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(self.settings.poll_timeout));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
