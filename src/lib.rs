//! Live market quotes pushed into a running spreadsheet
//!
//! Callers hand snapshots to a rate-limited queue; a single dedicated
//! writer thread owns the spreadsheet handle and rewrites cells in place.

pub mod core;
pub mod feed;
pub mod greeks;
pub mod infrastructure;
pub mod layout;
pub mod sheet;
pub mod worker;
pub mod writer;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use feed::SheetFeed;
pub use infrastructure::config::{Config, FeedConfig, LayoutConfig, SheetConfig};
pub use worker::SheetUpdater;

use thiserror::Error;

/// Main error type for the sheet feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Spreadsheet error: {0}")]
    Sheet(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Missing field `{field}` for {symbol}")]
    MissingField { symbol: String, field: &'static str },

    #[error("Greeks error: {0}")]
    Greeks(String),

    #[error("Time error: {0}")]
    Time(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FeedError>;
