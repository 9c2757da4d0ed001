//! Configuration management for the sheet feed
//!
//! Loads configuration from config.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::clock::IST_OFFSET_MINUTES;
use crate::greeks::black_scholes::DEFAULT_RISK_FREE_RATE;

/// Largest options block the layout accepts
pub const MAX_STRIKES_PER_BLOCK: u32 = 500;

/// Sheet feed configuration
///
/// Loaded from config.toml at startup. Every section falls back to its
/// defaults when absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Submission and worker loop settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Workbook layout
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Greeks model settings
    #[serde(default)]
    pub greeks: GreeksConfig,

    /// Spreadsheet backend
    #[serde(default)]
    pub sheet: SheetConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Submission and worker loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Minimum interval between accepted submissions in milliseconds
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Maximum snapshots waiting for the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the writer blocks on an empty queue before checking for stop
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Attempts to open the spreadsheet before giving up
    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,

    /// Delay between spreadsheet open attempts in milliseconds
    #[serde(default = "default_init_retry_delay_ms")]
    pub init_retry_delay_ms: u64,

    /// Market time zone as minutes east of UTC (330 = IST)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

/// Workbook layout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Strike rows reserved per options block
    #[serde(default = "default_strikes_per_block")]
    pub strikes_per_block: u32,

    /// Title written in the first row
    #[serde(default = "default_title")]
    pub title: String,
}

/// Greeks model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GreeksConfig {
    /// Annual risk-free rate as a fraction
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

/// Which spreadsheet backend the writer drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetBackend {
    /// In-process grid saved as JSON
    #[default]
    Memory,
    /// External automation helper process
    Bridge,
}

/// Spreadsheet backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub backend: SheetBackend,

    /// Where the memory backend writes the grid on save
    #[serde(default = "default_memory_save_path")]
    pub save_path: PathBuf,

    /// Automation helper settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Automation helper process configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Helper executable
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Helper arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Show the application window
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Workbook path passed with save requests (helper default when unset)
    #[serde(default)]
    pub save_path: Option<String>,

    /// How long to wait for the helper to exit after quit
    #[serde(default = "default_quit_timeout_ms")]
    pub quit_timeout_ms: u64,

    /// How long to wait for each response before killing the helper
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            queue_capacity: default_queue_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
            init_attempts: default_init_attempts(),
            init_retry_delay_ms: default_init_retry_delay_ms(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            strikes_per_block: default_strikes_per_block(),
            title: default_title(),
        }
    }
}

impl Default for GreeksConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            backend: SheetBackend::default(),
            save_path: default_memory_save_path(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
            visible: default_visible(),
            save_path: None,
            quit_timeout_ms: default_quit_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_update_interval_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    64
}

fn default_poll_timeout_ms() -> u64 {
    100
}

fn default_init_attempts() -> u32 {
    3
}

fn default_init_retry_delay_ms() -> u64 {
    2_000
}

fn default_utc_offset_minutes() -> i32 {
    IST_OFFSET_MINUTES
}

fn default_strikes_per_block() -> u32 {
    21 // ATM plus ten strikes either side
}

fn default_title() -> String {
    "Live Market Monitor".to_string()
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

fn default_memory_save_path() -> PathBuf {
    PathBuf::from("market_monitor.json")
}

fn default_bridge_command() -> String {
    "excel-bridge".to_string()
}

fn default_visible() -> bool {
    true
}

fn default_quit_timeout_ms() -> u64 {
    5_000
}

fn default_response_timeout_ms() -> u64 {
    5_000
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.queue_capacity == 0 {
            return Err(ConfigError::Invalid("feed.queue_capacity must be positive".into()));
        }
        if self.feed.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid("feed.poll_timeout_ms must be positive".into()));
        }
        if self.feed.init_attempts == 0 {
            return Err(ConfigError::Invalid("feed.init_attempts must be positive".into()));
        }
        if self.layout.strikes_per_block == 0 || self.layout.strikes_per_block > MAX_STRIKES_PER_BLOCK {
            return Err(ConfigError::Invalid(format!(
                "layout.strikes_per_block must be between 1 and {MAX_STRIKES_PER_BLOCK}"
            )));
        }
        if self.sheet.bridge.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sheet.bridge.response_timeout_ms must be positive".into(),
            ));
        }
        if !self.greeks.risk_free_rate.is_finite() {
            return Err(ConfigError::Invalid("greeks.risk_free_rate must be finite".into()));
        }
        Ok(())
    }

    /// Minimum interval between accepted submissions
    #[inline]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.feed.update_interval_ms)
    }

    /// Bounded wait on the snapshot queue
    #[inline]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.feed.poll_timeout_ms)
    }

    #[inline]
    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.feed.init_retry_delay_ms)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    /// Parse error (invalid TOML)
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    /// Value out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.update_interval_ms, 500);
        assert_eq!(config.update_interval(), Duration::from_millis(500));
        assert_eq!(config.feed.queue_capacity, 64);
        assert_eq!(config.feed.utc_offset_minutes, 330);
        assert_eq!(config.layout.strikes_per_block, 21);
        assert_eq!(config.greeks.risk_free_rate, 0.10);
        assert_eq!(config.sheet.backend, SheetBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [feed]
            update_interval_ms = 250

            [sheet]
            backend = "bridge"

            [sheet.bridge]
            command = "wine"
            args = ["excel-bridge.exe"]
            "#,
        )
        .unwrap();
        assert_eq!(config.feed.update_interval_ms, 250);
        assert_eq!(config.feed.poll_timeout_ms, 100);
        assert_eq!(config.sheet.backend, SheetBackend::Bridge);
        assert_eq!(config.sheet.bridge.command, "wine");
        assert_eq!(config.sheet.bridge.args, vec!["excel-bridge.exe".to_string()]);
        assert!(config.sheet.bridge.visible);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml("[layout]\nstrikes_per_block = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml("[layout]\nstrikes_per_block = 100000000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(Config::from_toml("[layout]\nstrikes_per_block = 500\n").is_ok());

        let err = Config::from_toml("[sheet.bridge]\nresponse_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml("[feed]\nupdate_interval_ms = \"fast\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
