//! Pass timestamps in the market's fixed time zone
//!
//! The writer reads the clock once per snapshot and threads that value
//! through ATM selection, time-to-expiry and the "updated" stamp.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{FeedError, Result};

/// India Standard Time, +05:30
pub const IST_OFFSET_MINUTES: i32 = 330;

/// Days per year used for time-to-expiry
pub const DAYS_PER_YEAR: f64 = 365.0;

const STAMP_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Source of the pass timestamp
pub trait Clock: Send {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock converted to a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    offset: UtcOffset,
}

impl MarketClock {
    /// Clock for an offset given in minutes east of UTC
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = UtcOffset::from_whole_seconds(minutes * 60)
            .map_err(|e| FeedError::Time(format!("invalid UTC offset {minutes} min: {e}")))?;
        Ok(Self { offset })
    }

    /// Clock in India Standard Time
    pub fn ist() -> Self {
        Self {
            offset: time::macros::offset!(+5:30),
        }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::ist()
    }
}

impl Clock for MarketClock {
    #[inline]
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    #[inline]
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Years between `today` and `expiry`, counted in whole calendar days.
///
/// Negative once the contract has expired.
#[inline]
pub fn time_to_expiry(expiry: Date, today: Date) -> f64 {
    (expiry - today).whole_days() as f64 / DAYS_PER_YEAR
}

/// `HH:MM:SS` stamp written next to each row
pub fn format_stamp(now: OffsetDateTime) -> String {
    now.format(STAMP_FORMAT)
        .unwrap_or_else(|_| String::from("--:--:--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};
    use time::Duration;

    #[test]
    fn test_time_to_expiry_one_week() {
        let today = date!(2024 - 12 - 19);
        let expiry = today + Duration::days(7);
        let tte = time_to_expiry(expiry, today);
        assert!((tte - 7.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_to_expiry_expired_is_negative() {
        let tte = time_to_expiry(date!(2024 - 12 - 18), date!(2024 - 12 - 19));
        assert!(tte < 0.0);
    }

    #[test]
    fn test_format_stamp() {
        let now = datetime!(2024-12-19 09:15:07 +5:30);
        assert_eq!(format_stamp(now), "09:15:07");
    }

    #[test]
    fn test_market_clock_offset() {
        let clock = MarketClock::from_offset_minutes(IST_OFFSET_MINUTES).unwrap();
        assert_eq!(clock.offset(), MarketClock::ist().offset());
        assert_eq!(clock.now().offset(), clock.offset());
        assert!(MarketClock::from_offset_minutes(24 * 60 * 2).is_err());
    }

    #[test]
    fn test_fixed_clock() {
        let instant = datetime!(2024-12-19 10:00 +5:30);
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }
}
