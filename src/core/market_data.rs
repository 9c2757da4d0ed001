//! Market data types
//!
//! Quotes as handed over by the data producer. Every field except the
//! identifying ones is defaulted so a partial tick still deserializes; the
//! writer reports what is missing per symbol instead of rejecting the
//! whole snapshot.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::core::IndexId;
use crate::{FeedError, Result};

/// Spot index quotes keyed by spot display name
pub type MarketData = HashMap<String, MarketQuote>;
/// Futures quotes keyed by contract symbol
pub type FuturesData = HashMap<String, FuturesQuote>;
/// Option leg quotes keyed by leg symbol
pub type OptionsData = HashMap<String, OptionQuote>;

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CE", alias = "ce", alias = "CALL", alias = "call")]
    Call,
    #[serde(rename = "PE", alias = "pe", alias = "PUT", alias = "put")]
    Put,
}

impl OptionType {
    #[inline(always)]
    pub const fn is_call(self) -> bool {
        matches!(self, Self::Call)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => f.write_str("CE"),
            Self::Put => f.write_str("PE"),
        }
    }
}

/// Price fields shared by every quote
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFields {
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Percent change (already in percent units, 0.5 means 0.5%)
    #[serde(default)]
    pub change_percent: Option<f64>,
    /// Absolute change, used when no percent change is supplied
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
}

impl PriceFields {
    /// Last traded price or a `MissingField` error naming `symbol`
    pub fn require_last_price(&self, symbol: &str) -> Result<f64> {
        match self.last_price {
            Some(price) if price.is_finite() => Ok(price),
            _ => Err(FeedError::MissingField {
                symbol: symbol.to_string(),
                field: "last_price",
            }),
        }
    }

    /// Percent change, derived from the absolute change when absent
    pub fn effective_change_percent(&self) -> f64 {
        if let Some(pct) = self.change_percent {
            return pct;
        }
        match (self.last_price, self.change) {
            (Some(last), Some(change)) => change_percent(last, change),
            _ => 0.0,
        }
    }
}

/// Percent change from last price and absolute change
#[inline]
pub fn change_percent(last_price: f64, change: f64) -> f64 {
    let previous = last_price - change;
    if previous == 0.0 {
        0.0
    } else {
        change / previous * 100.0
    }
}

/// Spot index quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    #[serde(flatten)]
    pub prices: PriceFields,
}

/// Order book top shared by futures and options
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthFields {
    #[serde(default)]
    pub volume: u64,
    #[serde(default, alias = "open_interest")]
    pub oi: u64,
    #[serde(default)]
    pub bid_price: f64,
    #[serde(default)]
    pub bid_qty: u64,
    #[serde(default)]
    pub ask_price: f64,
    #[serde(default)]
    pub ask_qty: u64,
}

/// Futures contract quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuturesQuote {
    #[serde(flatten)]
    pub prices: PriceFields,
    #[serde(flatten)]
    pub depth: DepthFields,
    #[serde(default)]
    pub expiry: Option<Date>,
}

/// Option leg quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Derivative underlying, e.g. `NIFTY`; taken from the leg symbol when absent
    #[serde(default)]
    pub underlying: Option<String>,
    pub strike: f64,
    pub option_type: OptionType,
    #[serde(default)]
    pub expiry: Option<Date>,
    #[serde(flatten)]
    pub prices: PriceFields,
    #[serde(flatten)]
    pub depth: DepthFields,
}

impl OptionQuote {
    /// Create a leg with only its identity set
    pub fn new(underlying: impl Into<String>, strike: f64, option_type: OptionType) -> Self {
        Self {
            underlying: Some(underlying.into()),
            strike,
            option_type,
            expiry: None,
            prices: PriceFields::default(),
            depth: DepthFields::default(),
        }
    }

    /// Index this leg belongs to
    ///
    /// Uses `underlying` when supplied, otherwise the prefix of `symbol`.
    pub fn index(&self, symbol: &str) -> Option<IndexId> {
        match self.underlying.as_deref() {
            Some(underlying) => IndexId::from_underlying(underlying),
            None => IndexId::from_contract_symbol(symbol),
        }
    }

    /// Expiry date or a `MissingField` error naming `symbol`
    pub fn require_expiry(&self, symbol: &str) -> Result<Date> {
        self.expiry.ok_or_else(|| FeedError::MissingField {
            symbol: symbol.to_string(),
            field: "expiry",
        })
    }
}

/// One immutable bundle of market, futures and options quotes.
///
/// Produced by the caller and consumed once by the writer thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub market_data: MarketData,
    #[serde(default)]
    pub futures_data: FuturesData,
    #[serde(default)]
    pub options_data: OptionsData,
}

impl Snapshot {
    pub fn new(market_data: MarketData, futures_data: FuturesData, options_data: OptionsData) -> Self {
        Self {
            market_data,
            futures_data,
            options_data,
        }
    }

    /// Parse one JSON document, setting aside quotes that do not fit
    ///
    /// Only a document that is not an object of the three maps is an
    /// error. A single malformed quote is returned in the rejected list and
    /// the rest of the snapshot is kept.
    pub fn from_json(json: &str) -> Result<(Self, Vec<RejectedQuote>)> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        let mut rejected = Vec::new();
        let snapshot = Self {
            market_data: parse_section("market_data", raw.market_data, &mut rejected),
            futures_data: parse_section("futures_data", raw.futures_data, &mut rejected),
            options_data: parse_section("options_data", raw.options_data, &mut rejected),
        };
        Ok((snapshot, rejected))
    }

    /// Spot quote for an index
    pub fn spot(&self, index: IndexId) -> Option<&MarketQuote> {
        self.market_data.get(index.spot_name())
    }

    /// Total number of quotes across the three maps
    pub fn quote_count(&self) -> usize {
        self.market_data.len() + self.futures_data.len() + self.options_data.len()
    }
}

/// Quote dropped while parsing a snapshot
#[derive(Debug)]
pub struct RejectedQuote {
    /// Map the quote came from, e.g. `options_data`
    pub section: &'static str,
    pub symbol: String,
    pub error: serde_json::Error,
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    market_data: HashMap<String, Value>,
    #[serde(default)]
    futures_data: HashMap<String, Value>,
    #[serde(default)]
    options_data: HashMap<String, Value>,
}

fn parse_section<T: DeserializeOwned>(
    section: &'static str,
    entries: HashMap<String, Value>,
    rejected: &mut Vec<RejectedQuote>,
) -> HashMap<String, T> {
    let mut parsed = HashMap::with_capacity(entries.len());
    for (symbol, value) in entries {
        match serde_json::from_value(value) {
            Ok(quote) => {
                parsed.insert(symbol, quote);
            }
            Err(error) => rejected.push(RejectedQuote {
                section,
                symbol,
                error,
            }),
        }
    }
    parsed
}
