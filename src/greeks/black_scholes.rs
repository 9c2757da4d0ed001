//! Black-Scholes Greeks with Newton-Raphson implied volatility
//!
//! European pricing without dividends. Theta is per year and vega is per
//! one volatility point (scaled by 0.01). Outputs are rounded to the
//! precision shown in the sheet.

use std::f64::consts::PI;

use crate::core::OptionType;
use crate::greeks::{Greeks, GreeksEngine};
use crate::{FeedError, Result};

/// Risk-free rate for the Indian market
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.10;

/// Floor applied to time-to-expiry on expiry day (one hour)
pub const MIN_TIME_TO_EXPIRY: f64 = 1.0 / (365.0 * 24.0);

const INITIAL_SIGMA: f64 = 0.5;
const MAX_ITERATIONS: usize = 100;
const PRICE_PRECISION: f64 = 1e-4;
const MIN_SIGMA: f64 = 1e-4;
const MAX_SIGMA: f64 = 5.0;
const MIN_VEGA: f64 = 1e-8;

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Abramowitz-Stegun approximation, absolute error below 1e-7
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = k
        * (0.319381530
            + k * (-0.356563782 + k * (1.781477937 + k * (-1.821255978 + k * 1.330274429))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

#[inline]
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Black-Scholes model at a fixed risk-free rate
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    rate: f64,
}

impl BlackScholes {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Check inputs and floor time-to-expiry
    fn checked_time(spot: f64, strike: f64, time_to_expiry: f64) -> Result<f64> {
        if !(spot.is_finite() && spot > 0.0) {
            return Err(FeedError::Greeks(format!("invalid spot {spot}")));
        }
        if !(strike.is_finite() && strike > 0.0) {
            return Err(FeedError::Greeks(format!("invalid strike {strike}")));
        }
        if !time_to_expiry.is_finite() || time_to_expiry < 0.0 {
            return Err(FeedError::Greeks(format!(
                "contract expired (time to expiry {time_to_expiry:.6})"
            )));
        }
        Ok(time_to_expiry.max(MIN_TIME_TO_EXPIRY))
    }

    fn d1_d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> (f64, f64) {
        let sqrt_t = time.sqrt();
        let d1 = ((spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time) / (vol * sqrt_t);
        let d2 = d1 - vol * sqrt_t;
        (d1, d2)
    }

    /// Theoretical premium
    pub fn price(&self, spot: f64, strike: f64, time: f64, vol: f64, option_type: OptionType) -> f64 {
        let (d1, d2) = self.d1_d2(spot, strike, time, vol);
        let discount = (-self.rate * time).exp();
        let price = match option_type {
            OptionType::Call => spot * norm_cdf(d1) - strike * discount * norm_cdf(d2),
            OptionType::Put => strike * discount * norm_cdf(-d2) - spot * norm_cdf(-d1),
        };
        price.max(0.0)
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_FREE_RATE)
    }
}

impl GreeksEngine for BlackScholes {
    fn estimate_implied_volatility(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        market_price: f64,
        option_type: OptionType,
    ) -> Result<f64> {
        let time = Self::checked_time(spot, strike, time_to_expiry)?;
        if !(market_price.is_finite() && market_price > 0.0) {
            return Err(FeedError::Greeks(format!("invalid market price {market_price}")));
        }

        let mut sigma = INITIAL_SIGMA;
        for _ in 0..MAX_ITERATIONS {
            let diff = market_price - self.price(spot, strike, time, sigma, option_type);
            if diff.abs() < PRICE_PRECISION {
                return Ok(sigma * 100.0);
            }

            let (d1, _) = self.d1_d2(spot, strike, time, sigma);
            let vega = spot * time.sqrt() * norm_pdf(d1);
            if vega < MIN_VEGA {
                return Err(FeedError::Greeks(format!(
                    "vega vanished at sigma {sigma:.4} for strike {strike}"
                )));
            }

            sigma = (sigma + diff / vega).clamp(MIN_SIGMA, MAX_SIGMA);
        }

        // Best estimate after the iteration budget
        Ok(sigma * 100.0)
    }

    fn compute_greeks(
        &self,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Result<Greeks> {
        let time = Self::checked_time(spot, strike, time_to_expiry)?;
        if !(volatility.is_finite() && volatility > 0.0) {
            return Err(FeedError::Greeks(format!("invalid volatility {volatility}")));
        }

        let r = self.rate;
        let (d1, d2) = self.d1_d2(spot, strike, time, volatility);
        let pdf = norm_pdf(d1);
        let sqrt_t = time.sqrt();
        let discount = (-r * time).exp();

        let delta = match option_type {
            OptionType::Call => norm_cdf(d1),
            OptionType::Put => norm_cdf(d1) - 1.0,
        };

        let gamma = pdf / (spot * volatility * sqrt_t);

        let decay = -(spot * pdf * volatility) / (2.0 * sqrt_t);
        let theta = match option_type {
            OptionType::Call => decay - r * strike * discount * norm_cdf(d2),
            OptionType::Put => decay + r * strike * discount * norm_cdf(-d2),
        };

        let vega = spot * sqrt_t * pdf * 0.01;

        Ok(Greeks {
            delta: round_to(delta, 4),
            gamma: round_to(gamma, 6),
            theta: round_to(theta, 4),
            vega: round_to(vega, 4),
        })
    }
}
