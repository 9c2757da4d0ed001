//! Test fixtures for snapshots and option legs

use time::macros::datetime;
use time::{Date, Duration, OffsetDateTime};

use crate::core::{
    DepthFields, FuturesQuote, MarketQuote, OptionQuote, OptionType, PriceFields, Snapshot,
};

/// Pass timestamp used by writer tests (a Thursday, 10:00 IST)
pub fn test_now() -> OffsetDateTime {
    datetime!(2024-12-19 10:00:00 +5:30)
}

/// Expiry one week after `test_now`
pub fn test_expiry() -> Date {
    test_now().date() + Duration::days(7)
}

/// Option leg with a last price, keyed by a generated symbol
pub fn option_leg(
    underlying: &str,
    strike: f64,
    option_type: OptionType,
    last_price: f64,
) -> (String, OptionQuote) {
    let symbol = format!("{underlying}{strike:.0}{option_type}");
    let mut quote = OptionQuote::new(underlying, strike, option_type);
    quote.expiry = Some(test_expiry());
    quote.prices = PriceFields {
        last_price: Some(last_price),
        change_percent: Some(1.5),
        open: last_price * 0.9,
        high: last_price * 1.1,
        low: last_price * 0.85,
        close: last_price * 0.95,
        ..PriceFields::default()
    };
    quote.depth = DepthFields {
        volume: 1_000,
        oi: 50_000,
        bid_price: last_price - 0.5,
        bid_qty: 75,
        ask_price: last_price + 0.5,
        ask_qty: 50,
    };
    (symbol, quote)
}

/// Spot quote with open/close around `last_price`
pub fn spot_quote(last_price: f64, change_percent: f64) -> MarketQuote {
    MarketQuote {
        prices: PriceFields {
            last_price: Some(last_price),
            change_percent: Some(change_percent),
            change: None,
            open: last_price - 20.0,
            high: last_price + 40.0,
            low: last_price - 60.0,
            close: last_price,
        },
    }
}

/// Futures quote a little above spot
pub fn futures_quote(last_price: f64) -> FuturesQuote {
    FuturesQuote {
        prices: PriceFields {
            last_price: Some(last_price),
            change_percent: Some(0.4),
            ..PriceFields::default()
        },
        depth: DepthFields {
            volume: 250_000,
            oi: 1_200_000,
            bid_price: last_price - 1.0,
            bid_qty: 300,
            ask_price: last_price + 1.0,
            ask_qty: 450,
        },
        expiry: Some(test_expiry()),
    }
}

/// NIFTY spot, one futures contract and a three-strike chain
pub fn nifty_snapshot(spot: f64) -> Snapshot {
    let mut snapshot = Snapshot::default();
    snapshot
        .market_data
        .insert("NIFTY 50".to_string(), spot_quote(spot, 0.6));
    snapshot
        .futures_data
        .insert("NIFTY24DECFUT".to_string(), futures_quote(spot + 45.0));
    for (strike, call, put) in [
        (24100.0, 120.0, 80.0),
        (24000.0, 190.0, 40.0),
        (24050.0, 150.0, 60.0),
    ] {
        let (sym, quote) = option_leg("NIFTY", strike, OptionType::Call, call);
        snapshot.options_data.insert(sym, quote);
        let (sym, quote) = option_leg("NIFTY", strike, OptionType::Put, put);
        snapshot.options_data.insert(sym, quote);
    }
    snapshot
}
