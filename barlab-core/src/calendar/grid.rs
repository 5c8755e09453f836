//! Expected-timestamp grid generation.
//!
//! The grid is the canonical sequence of bar timestamps for a date range:
//! the gap filler joins realized bars onto it, and cache keys assume it is
//! byte-identical for identical inputs.

use super::{at_local, SessionDay, TradingCalendar};
use crate::timeframe::Granularity;
use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;

/// Build the ordered, de-duplicated expected-timestamp sequence for
/// `[start, end]` at the given granularity.
///
/// Daily: one local-midnight timestamp per trading day. Minute: per
/// trading day, one timestamp per minute over the session segments,
/// left-closed/right-open:
///
/// - `full_hour == false`: `[session_open, session_close)`
/// - `full_hour == true`, normal day: `[04:00, 20:00)`
/// - `full_hour == true`, half day: `[04:00, 13:00)` and `[16:00, 17:00)`
///
/// A range with no sessions yields an empty sequence.
pub fn build_grid(
    calendar: &dyn TradingCalendar,
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    full_hour: bool,
) -> Vec<DateTime<Tz>> {
    let sessions = calendar.sessions(start, end);
    let mut timestamps = Vec::new();

    for day in &sessions {
        match granularity {
            Granularity::Daily => timestamps.push(at_local(day.date, 0, 0)),
            Granularity::Minute => {
                for (seg_start, seg_end) in segments(day, full_hour) {
                    let mut t = seg_start;
                    while t < seg_end {
                        timestamps.push(t);
                        t = t + Duration::minutes(1);
                    }
                }
            }
        }
    }

    timestamps.sort_unstable();
    timestamps.dedup();
    timestamps
}

fn segments(day: &SessionDay, full_hour: bool) -> Vec<(DateTime<Tz>, DateTime<Tz>)> {
    if !full_hour {
        return vec![(day.open, day.close)];
    }
    if day.is_half_day() {
        vec![
            (at_local(day.date, 4, 0), at_local(day.date, 13, 0)),
            (at_local(day.date, 16, 0), at_local(day.date, 17, 0)),
        ]
    } else {
        vec![(at_local(day.date, 4, 0), at_local(day.date, 20, 0))]
    }
}
