//! Bar — the fundamental market data unit.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// Exchange-local timezone for all bar timestamps and session arithmetic.
pub const MARKET_TZ: Tz = chrono_tz::America::New_York;

/// OHLCV bar for a single ticker at a single (tz-aware) timestamp.
///
/// Daily bars carry a local-midnight timestamp; intraday bars carry the
/// minute (or bucket) start. Every stage produces a new `Vec<Bar>` — bars
/// are never mutated in place once a stage has emitted them.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub ticker: String,
    pub ts: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub transactions: u64,
}

impl Bar {
    /// Trading date of this bar in exchange-local time.
    pub fn trade_date(&self) -> NaiveDate {
        self.ts.date_naive()
    }

    /// Returns true if any OHLC field is NaN (void bar).
    ///
    /// Void bars mark grid slots that precede a ticker's first realized
    /// close: there is nothing to forward-fill from, so the slot carries
    /// no price. Downstream consumers drop them by range intersection.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// A synthetic no-trade bar: all four prices pinned to the carried
    /// close, zero volume and transactions.
    pub fn flat(ticker: &str, ts: DateTime<Tz>, close: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
            transactions: 0,
        }
    }

    /// A void bar for a grid slot with no realized or fillable data.
    pub fn void(ticker: &str, ts: DateTime<Tz>) -> Self {
        Self {
            ticker: ticker.to_string(),
            ts,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: 0,
            transactions: 0,
        }
    }

    /// Basic OHLC sanity check: high is the top of the range, low the bottom.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}
