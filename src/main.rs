//! Live market monitor
//!
//! Reads newline-delimited JSON snapshots on stdin, each shaped as
//! `{"market_data": {...}, "futures_data": {...}, "options_data": {...}}`,
//! and pushes them into a live spreadsheet through the rate-limited feed.
//! End of input shuts the writer down, saving and closing the workbook.
//!
//! # Architecture
//! - **core**: Indices, quotes, strike ladders, market clock
//! - **greeks**: Implied volatility and Greeks per option leg
//! - **sheet**: Spreadsheet capability and backends
//! - **layout** / **writer**: Where each value goes and the update pass
//! - **feed** / **worker**: Rate-limited queue and the dedicated writer thread
//! - **infrastructure**: Config, logging, metrics

use std::io::{self, BufRead};

use anyhow::Context;
use sheet_feed::core::{MarketClock, Snapshot};
use sheet_feed::greeks::BlackScholes;
use sheet_feed::infrastructure::config::SheetBackend;
use sheet_feed::infrastructure::logging::init_logging;
use sheet_feed::sheet::{BridgeSheet, MemorySheet};
use sheet_feed::{Config, SheetUpdater};

fn main() -> anyhow::Result<()> {
    // Load config or use defaults
    let config = Config::load().context("failed to load configuration")?;

    let _guards = init_logging(&config.logging).context("failed to initialize logging")?;

    let clock = MarketClock::from_offset_minutes(config.feed.utc_offset_minutes)?;
    let greeks = BlackScholes::new(config.greeks.risk_free_rate);

    let updater = match config.sheet.backend {
        SheetBackend::Memory => {
            let path = config.sheet.save_path.clone();
            tracing::info!(path = %path.display(), "Using in-memory spreadsheet");
            SheetUpdater::start(
                &config,
                move || Ok(MemorySheet::with_save_path(&path)),
                greeks,
                clock,
            )?
        }
        SheetBackend::Bridge => {
            let bridge = config.sheet.bridge.clone();
            tracing::info!(command = %bridge.command, "Using spreadsheet bridge");
            SheetUpdater::start(&config, move || BridgeSheet::launch(&bridge), greeks, clock)?
        }
    };

    let feed = updater.feed();
    for (number, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("failed to read snapshot stream")?;
        if line.trim().is_empty() {
            continue;
        }
        match Snapshot::from_json(&line) {
            Ok((snapshot, rejected)) => {
                for quote in &rejected {
                    tracing::warn!(
                        target: "feed",
                        line = number + 1,
                        section = quote.section,
                        symbol = %quote.symbol,
                        error = %quote.error,
                        "Skipping malformed quote"
                    );
                }
                feed.submit(
                    snapshot.market_data,
                    snapshot.futures_data,
                    snapshot.options_data,
                );
            }
            Err(e) => {
                tracing::warn!(target: "feed", line = number + 1, error = %e, "Skipping malformed snapshot");
            }
        }
    }

    tracing::info!("Input closed, shutting down sheet writer");
    let metrics = updater.metrics().clone();
    updater.shutdown();

    let summary = metrics.snapshot();
    tracing::info!(
        submitted = summary.submitted,
        accepted = summary.accepted,
        rate_limited = summary.rate_limited,
        dropped = summary.dropped,
        processed = summary.processed,
        failed_passes = summary.failed_passes,
        leg_errors = summary.leg_errors,
        uptime_seconds = summary.uptime_seconds,
        "Final feed metrics"
    );

    Ok(())
}
