//! Tracked indices and their naming
//!
//! Each index is known by two names: the spot display name used by the
//! market data map, and the derivative underlying that prefixes its
//! futures and option contracts.

use std::fmt;

/// One of the five tracked indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IndexId {
    Nifty = 0,
    BankNifty = 1,
    FinNifty = 2,
    MidcpNifty = 3,
    Sensex = 4,
}

impl IndexId {
    /// All tracked indices in display order
    pub const ALL: [IndexId; 5] = [
        IndexId::Nifty,
        IndexId::BankNifty,
        IndexId::FinNifty,
        IndexId::MidcpNifty,
        IndexId::Sensex,
    ];

    /// Position in `ALL`
    #[inline(always)]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Spot name as it appears in the market data map
    pub const fn spot_name(self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY 50",
            Self::BankNifty => "NIFTY BANK",
            Self::FinNifty => "NIFTY FIN SERVICE",
            Self::MidcpNifty => "NIFTY MID SELECT",
            Self::Sensex => "SENSEX",
        }
    }

    /// Underlying name used by futures and option contracts
    pub const fn underlying(self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY",
            Self::BankNifty => "BANKNIFTY",
            Self::FinNifty => "FINNIFTY",
            Self::MidcpNifty => "MIDCPNIFTY",
            Self::Sensex => "SENSEX",
        }
    }

    /// Distance between listed strikes
    pub const fn strike_increment(self) -> f64 {
        match self {
            Self::BankNifty | Self::Sensex => 100.0,
            Self::Nifty | Self::FinNifty | Self::MidcpNifty => 50.0,
        }
    }

    /// Lookup by spot display name
    pub fn from_spot_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|index| index.spot_name() == name)
    }

    /// Lookup by underlying name (case-insensitive)
    pub fn from_underlying(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|index| index.underlying().eq_ignore_ascii_case(name))
    }

    /// Resolve a contract symbol such as `BANKNIFTY24DECFUT` to its index.
    ///
    /// The longest matching underlying wins, so `NIFTY` never claims a
    /// `NIFTYNXT` style symbol that a longer entry would match.
    pub fn from_contract_symbol(symbol: &str) -> Option<Self> {
        let upper = symbol.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .filter(|index| upper.starts_with(index.underlying()))
            .max_by_key(|index| index.underlying().len())
    }

    /// ATM strike for a spot price
    #[inline]
    pub fn atm_strike(self, spot: f64) -> f64 {
        atm_strike(spot, self.strike_increment())
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spot_name())
    }
}

/// Round a spot price to the nearest strike increment.
///
/// Halfway values round away from zero.
#[inline]
pub fn atm_strike(spot: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return spot;
    }
    (spot / increment).round() * increment
}
