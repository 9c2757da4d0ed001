//! Strike ladder for one index
//!
//! Groups the option legs of a snapshot by strike, pairing call and put
//! legs that share a strike. Rebuilt on every pass because the set of
//! incoming legs changes from tick to tick.

use std::collections::BTreeMap;

use crate::core::{IndexId, OptionQuote, OptionType, OptionsData};

/// Strike stored in hundredths so it can key an ordered map
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrikeKey(i64);

impl StrikeKey {
    #[inline]
    pub fn from_price(strike: f64) -> Self {
        Self((strike * 100.0).round() as i64)
    }

    #[inline]
    pub fn as_price(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Option leg borrowed from a snapshot together with its symbol
#[derive(Debug, Clone, Copy)]
pub struct Leg<'a> {
    pub symbol: &'a str,
    pub quote: &'a OptionQuote,
}

/// Call and put legs sharing one strike
#[derive(Debug, Clone, Default)]
pub struct StrikeRow<'a> {
    pub call: Option<Leg<'a>>,
    pub put: Option<Leg<'a>>,
}

impl<'a> StrikeRow<'a> {
    /// Leg for one side
    #[inline]
    pub fn leg(&self, side: OptionType) -> Option<Leg<'a>> {
        match side {
            OptionType::Call => self.call,
            OptionType::Put => self.put,
        }
    }
}

/// Strikes of one index in ascending order
#[derive(Debug, Clone, Default)]
pub struct StrikeLadder<'a> {
    rows: BTreeMap<StrikeKey, StrikeRow<'a>>,
}

impl<'a> StrikeLadder<'a> {
    /// Collect the legs that belong to `index`
    pub fn build(index: IndexId, options: &'a OptionsData) -> Self {
        let mut rows: BTreeMap<StrikeKey, StrikeRow<'a>> = BTreeMap::new();

        for (symbol, quote) in options {
            if quote.index(symbol) != Some(index) {
                continue;
            }
            if !quote.strike.is_finite() {
                tracing::warn!(target: "sheet", symbol = %symbol, "Skipping leg with invalid strike");
                continue;
            }

            let row = rows.entry(StrikeKey::from_price(quote.strike)).or_default();
            let leg = Leg {
                symbol: symbol.as_str(),
                quote,
            };
            let slot = match quote.option_type {
                OptionType::Call => &mut row.call,
                OptionType::Put => &mut row.put,
            };
            if let Some(previous) = slot.replace(leg) {
                // Two symbols for the same strike and side: keep the lexically first
                if previous.symbol < symbol.as_str() {
                    *slot = Some(previous);
                }
            }
        }

        Self { rows }
    }

    /// Number of distinct strikes
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Strikes in ascending order with their rank
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64, &StrikeRow<'a>)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(rank, (key, row))| (rank, key.as_price(), row))
    }

    /// Ascending strike prices
    pub fn strikes(&self) -> Vec<f64> {
        self.rows.keys().map(|key| key.as_price()).collect()
    }

    /// Rank of a strike in the ladder
    pub fn rank_of(&self, strike: f64) -> Option<usize> {
        let key = StrikeKey::from_price(strike);
        self.rows.keys().position(|k| *k == key)
    }
}

/// True when `strike` is the ATM strike
#[inline]
pub fn is_atm(strike: f64, atm: Option<f64>) -> bool {
    match atm {
        Some(atm) => StrikeKey::from_price(strike) == StrikeKey::from_price(atm),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::option_leg;
    use proptest::prelude::*;

    #[test]
    fn test_ladder_sorted_regardless_of_insertion() {
        let mut options = OptionsData::new();
        for strike in [24100.0, 24000.0, 24050.0] {
            let (symbol, quote) = option_leg("NIFTY", strike, OptionType::Call, 100.0);
            options.insert(symbol, quote);
        }

        let ladder = StrikeLadder::build(IndexId::Nifty, &options);
        assert_eq!(ladder.strikes(), vec![24000.0, 24050.0, 24100.0]);
        assert_eq!(ladder.rank_of(24000.0), Some(0));
        assert_eq!(ladder.rank_of(24050.0), Some(1));
        assert_eq!(ladder.rank_of(24100.0), Some(2));
    }

    #[test]
    fn test_ladder_pairs_call_and_put() {
        let mut options = OptionsData::new();
        let (call_sym, call) = option_leg("NIFTY", 24000.0, OptionType::Call, 180.0);
        let (put_sym, put) = option_leg("NIFTY", 24000.0, OptionType::Put, 95.0);
        options.insert(call_sym.clone(), call);
        options.insert(put_sym.clone(), put);

        let ladder = StrikeLadder::build(IndexId::Nifty, &options);
        assert_eq!(ladder.len(), 1);
        let (_, strike, row) = ladder.iter().next().unwrap();
        assert_eq!(strike, 24000.0);
        assert_eq!(row.call.unwrap().symbol, call_sym);
        assert_eq!(row.put.unwrap().symbol, put_sym);
    }

    #[test]
    fn test_ladder_filters_other_indices() {
        let mut options = OptionsData::new();
        let (sym, quote) = option_leg("BANKNIFTY", 51200.0, OptionType::Put, 300.0);
        options.insert(sym, quote);
        let (sym, quote) = option_leg("NIFTY", 24000.0, OptionType::Put, 90.0);
        options.insert(sym, quote);

        let ladder = StrikeLadder::build(IndexId::Nifty, &options);
        assert_eq!(ladder.strikes(), vec![24000.0]);
        let bank = StrikeLadder::build(IndexId::BankNifty, &options);
        assert_eq!(bank.strikes(), vec![51200.0]);
        assert!(StrikeLadder::build(IndexId::Sensex, &options).is_empty());
    }

    #[test]
    fn test_untagged_legs_grouped_by_symbol_prefix() {
        let mut options = OptionsData::new();
        for (symbol, strike) in [("MIDCPNIFTY24DEC12500CE", 12500.0), ("NIFTY24DEC24000CE", 24000.0)] {
            let (_, mut quote) = option_leg("NIFTY", strike, OptionType::Call, 50.0);
            quote.underlying = None;
            options.insert(symbol.to_string(), quote);
        }

        let nifty = StrikeLadder::build(IndexId::Nifty, &options);
        assert_eq!(nifty.strikes(), vec![24000.0]);
        let midcap = StrikeLadder::build(IndexId::MidcpNifty, &options);
        assert_eq!(midcap.strikes(), vec![12500.0]);
    }

    #[test]
    fn test_is_atm() {
        assert!(is_atm(24150.0, Some(24150.0)));
        assert!(!is_atm(24100.0, Some(24150.0)));
        assert!(!is_atm(24150.0, None));
    }

    proptest! {
        #[test]
        fn prop_ladder_is_strictly_ascending(strikes in proptest::collection::vec(100u32..2000, 1..40)) {
            let mut options = OptionsData::new();
            for s in &strikes {
                let (sym, quote) = option_leg("NIFTY", *s as f64 * 50.0, OptionType::Call, 10.0);
                options.insert(sym, quote);
            }
            let ladder = StrikeLadder::build(IndexId::Nifty, &options);
            let listed = ladder.strikes();
            prop_assert!(listed.windows(2).all(|w| w[0] < w[1]));
            for (rank, strike, _) in ladder.iter() {
                prop_assert_eq!(ladder.rank_of(strike), Some(rank));
            }
        }
    }
}
