//! Infrastructure: configuration, logging and metrics

pub mod config;
pub mod logging;
pub mod metrics;
