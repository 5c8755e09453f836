//! Trading calendars: session schedules and the expected-timestamp grid.
//!
//! The [`TradingCalendar`] trait is the seam for an external calendar
//! provider; [`nyse::XnysCalendar`] is the built-in deterministic
//! implementation for US equities.

pub mod grid;
pub mod nyse;

use crate::config::ConfigError;
use crate::domain::MARKET_TZ;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

pub use grid::build_grid;
pub use nyse::XnysCalendar;

/// Named trading windows within a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Premarket,
    Regular,
    Afterhours,
}

/// One trading day's regular session bounds, exchange-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDay {
    pub date: NaiveDate,
    pub open: DateTime<Tz>,
    pub close: DateTime<Tz>,
}

impl SessionDay {
    /// Half days close the regular session at 13:00 local.
    pub fn is_half_day(&self) -> bool {
        self.close.hour() == 13
    }
}

/// A provider of trading sessions for a date range.
pub trait TradingCalendar: Send + Sync {
    /// Regular-session bounds for each trading day in `[start, end]`,
    /// ascending. An empty range yields an empty vec, not an error.
    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Vec<SessionDay>;

    /// Resolve `(start, end)` trading dates from an anchor date and a signed
    /// trading-day offset. The anchor snaps to the closest trading day at or
    /// before it; the offset walks the schedule from there. The returned
    /// pair is always ordered.
    fn resolve_range(
        &self,
        anchor: NaiveDate,
        offset_days: i64,
    ) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        // Trading days run at least ~4 per 7 calendar days; doubling the
        // offset plus slack always covers the walk.
        let span = offset_days.unsigned_abs() as i64 * 2 + 14;
        let window_start = anchor - chrono::Duration::days(span);
        let window_end = anchor + chrono::Duration::days(span);
        let days: Vec<NaiveDate> = self
            .sessions(window_start, window_end)
            .iter()
            .map(|s| s.date)
            .collect();

        let anchor_idx = days
            .iter()
            .rposition(|d| *d <= anchor)
            .ok_or_else(|| ConfigError::CalendarRange(format!("no session on or before {anchor}")))?;
        let target_idx = anchor_idx as i64 + offset_days;
        if target_idx < 0 || target_idx >= days.len() as i64 {
            return Err(ConfigError::CalendarRange(format!(
                "trading-day offset {offset_days} from {anchor} leaves the schedule"
            )));
        }

        let a = days[anchor_idx];
        let b = days[target_idx as usize];
        Ok(if b < a { (b, a) } else { (a, b) })
    }
}

/// Resolve a calendar by configured name.
pub fn by_name(name: &str) -> Result<Box<dyn TradingCalendar>, ConfigError> {
    match name.to_ascii_uppercase().as_str() {
        "XNYS" | "NYSE" => Ok(Box::new(XnysCalendar)),
        other => Err(ConfigError::UnknownCalendar(other.to_string())),
    }
}

/// Exchange-local wall-clock instant on a date.
///
/// Session times all fall in 00:00 or 04:00–20:00 local, which never lands
/// in the 02:00 DST transition window, so the local→absolute mapping is
/// total and unambiguous.
pub(crate) fn at_local(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
    MARKET_TZ
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    #[test]
    fn at_local_handles_dst_days() {
        // 2024-03-10 springs forward at 02:00 New York; 04:00 still exists.
        let t = at_local(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), 4, 0);
        assert_eq!(t.hour(), 4);
        // The UTC offset that morning is already EDT (-4).
        assert_eq!(t.offset().fix().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn resolve_range_walks_backward() {
        let cal = XnysCalendar;
        // 2024-01-06 is a Saturday: anchor snaps to Friday the 5th, one
        // trading day back is Thursday the 4th.
        let (start, end) = cal
            .resolve_range(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(), -1)
            .unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn resolve_range_forward_is_ordered() {
        let cal = XnysCalendar;
        let (start, end) = cal
            .resolve_range(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 3)
            .unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn unknown_calendar_name_is_a_config_error() {
        assert!(by_name("XLON").is_err());
        assert!(by_name("xnys").is_ok());
    }
}
