//! Timeframe tokens ("1m", "5m", "1h", "1d", "1w", ...).

use crate::config::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Granularity of the expected-timestamp grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One slot per trading day, at local midnight.
    Daily,
    /// One slot per session minute.
    Minute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
            TimeUnit::Week => "w",
            TimeUnit::Month => "mo",
            TimeUnit::Quarter => "q",
            TimeUnit::Year => "y",
        }
    }
}

/// A parsed timeframe token.
///
/// The canonical rendering (`Display`) is the lowercase token, so a request
/// for "5M" and "5m" normalizes to the same cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeframe {
    pub value: u32,
    pub unit: TimeUnit,
}

impl Timeframe {
    /// Sub-day timeframes are built from minute data and may need resampling.
    pub fn is_intraday(&self) -> bool {
        matches!(self.unit, TimeUnit::Minute | TimeUnit::Hour)
    }

    pub fn granularity(&self) -> Granularity {
        if self.is_intraday() {
            Granularity::Minute
        } else {
            Granularity::Daily
        }
    }

    /// Bucket width in minutes. Only meaningful for intraday timeframes;
    /// daily-or-coarser tokens never reach the resampler.
    pub fn bar_minutes(&self) -> Option<u32> {
        match self.unit {
            TimeUnit::Minute => Some(self.value),
            TimeUnit::Hour => Some(self.value * 60),
            _ => None,
        }
    }

    /// "1m" and "1d" match a grid granularity exactly and skip resampling.
    pub fn is_native(&self) -> bool {
        match self.granularity() {
            Granularity::Minute => self.bar_minutes() == Some(1),
            Granularity::Daily => true,
        }
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lower = token.trim().to_ascii_lowercase();
        let split = lower
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ConfigError::InvalidTimeframe(token.to_string()))?;
        let (digits, suffix) = lower.split_at(split);

        let value: u32 = digits
            .parse()
            .map_err(|_| ConfigError::InvalidTimeframe(token.to_string()))?;
        if value == 0 {
            return Err(ConfigError::InvalidTimeframe(token.to_string()));
        }

        let unit = match suffix {
            "m" => TimeUnit::Minute,
            "h" => TimeUnit::Hour,
            "d" => TimeUnit::Day,
            "w" => TimeUnit::Week,
            "mo" => TimeUnit::Month,
            "q" => TimeUnit::Quarter,
            "y" => TimeUnit::Year,
            _ => return Err(ConfigError::InvalidTimeframe(token.to_string())),
        };

        Ok(Timeframe { value, unit })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}
