//! Greeks capability
//!
//! The writer only needs two operations per option leg: an implied
//! volatility from the leg's market price, and the Greeks at that
//! volatility. Any pricing model can sit behind [`GreeksEngine`].

pub mod black_scholes;

pub use black_scholes::BlackScholes;

use crate::core::OptionType;
use crate::Result;

/// Sensitivities at one volatility
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// Everything written for one leg: the four Greeks plus implied volatility
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GreeksResult {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    /// Implied volatility in percent
    pub iv: f64,
}

/// Implied volatility and Greeks for a single option leg
pub trait GreeksEngine {
    /// Implied volatility in percent (18.5 means 18.5%)
    fn estimate_implied_volatility(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        market_price: f64,
        option_type: OptionType,
    ) -> Result<f64>;

    /// Greeks at `volatility` (a fraction, 0.185 for 18.5%)
    fn compute_greeks(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Result<Greeks>;

    /// IV from the market price, then Greeks at that IV
    fn leg_greeks(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        market_price: f64,
        option_type: OptionType,
    ) -> Result<GreeksResult> {
        let iv = self.estimate_implied_volatility(
            spot,
            strike,
            time_to_expiry,
            market_price,
            option_type,
        )?;
        let greeks = self.compute_greeks(spot, strike, time_to_expiry, iv / 100.0, option_type)?;
        Ok(GreeksResult {
            delta: greeks.delta,
            gamma: greeks.gamma,
            theta: greeks.theta,
            vega: greeks.vega,
            iv,
        })
    }
}

impl<G: GreeksEngine + ?Sized> GreeksEngine for Box<G> {
    fn estimate_implied_volatility(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        market_price: f64,
        option_type: OptionType,
    ) -> Result<f64> {
        (**self).estimate_implied_volatility(spot, strike, time_to_expiry, market_price, option_type)
    }

    fn compute_greeks(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Result<Greeks> {
        (**self).compute_greeks(spot, strike, time_to_expiry, volatility, option_type)
    }
}
