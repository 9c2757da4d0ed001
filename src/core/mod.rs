//! Core domain types
//!
//! This module contains the fundamental types used throughout the system:
//! - IndexId: The five tracked indices and their strike increments
//! - Quotes and Snapshot: What a producer submits
//! - StrikeLadder: Option legs grouped by strike for one index
//! - Clock: Pass timestamps in the market's time zone

pub mod chain;
pub mod clock;
pub mod index;
pub mod market_data;

pub use chain::{is_atm, Leg, StrikeKey, StrikeLadder, StrikeRow};
pub use clock::{format_stamp, time_to_expiry, Clock, FixedClock, MarketClock};
pub use index::{atm_strike, IndexId};
pub use market_data::{
    change_percent, DepthFields, FuturesData, FuturesQuote, MarketData, MarketQuote, OptionQuote,
    OptionType, OptionsData, PriceFields, RejectedQuote, Snapshot,
};
