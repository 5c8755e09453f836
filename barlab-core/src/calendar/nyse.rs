//! Built-in XNYS (New York Stock Exchange) calendar.
//!
//! Weekday grid minus US market holidays, with abbreviated sessions
//! (close 13:00) on the usual half days. Holiday observance: Sunday
//! holidays shift to Monday; Saturday holidays shift to Friday, except
//! New Year's Day, which the exchange does not observe early.

use super::{at_local, SessionDay, TradingCalendar};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub struct XnysCalendar;

impl TradingCalendar for XnysCalendar {
    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Vec<SessionDay> {
        let mut days = Vec::new();
        let mut date = start;
        while date <= end {
            if is_trading_day(date) {
                let close_hour = if is_half_day(date) { 13 } else { 16 };
                days.push(SessionDay {
                    date,
                    open: at_local(date, 9, 30),
                    close: at_local(date, close_hour, 0),
                });
            }
            date += Duration::days(1);
        }
        days
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_trading_day(date: NaiveDate) -> bool {
    is_weekday(date) && !holidays(date.year()).contains(&date)
}

/// Abbreviated sessions: July 3rd, the day after Thanksgiving, and
/// Christmas Eve — when they land on a trading day at all.
fn is_half_day(date: NaiveDate) -> bool {
    let year = date.year();
    let candidates = [
        NaiveDate::from_ymd_opt(year, 7, 3),
        nth_weekday(year, 11, Weekday::Thu, 4).and_then(|t| t.succ_opt()),
        NaiveDate::from_ymd_opt(year, 12, 24),
    ];
    candidates
        .into_iter()
        .flatten()
        .any(|d| d == date && is_trading_day(d))
}

/// Observed market holidays falling within calendar year `year`.
fn holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(10);

    // New Year's Day: Sunday shifts to Monday, Saturday is not observed.
    if let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match jan1.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => days.extend(jan1.succ_opt()),
            _ => days.push(jan1),
        }
    }

    days.extend(nth_weekday(year, 1, Weekday::Mon, 3)); // MLK Day
    days.extend(nth_weekday(year, 2, Weekday::Mon, 3)); // Washington's Birthday
    days.extend(easter(year).map(|e| e - Duration::days(2))); // Good Friday
    days.extend(last_weekday(year, 5, Weekday::Mon)); // Memorial Day
    if year >= 2022 {
        days.extend(observed(NaiveDate::from_ymd_opt(year, 6, 19))); // Juneteenth
    }
    days.extend(observed(NaiveDate::from_ymd_opt(year, 7, 4))); // Independence Day
    days.extend(nth_weekday(year, 9, Weekday::Mon, 1)); // Labor Day
    days.extend(nth_weekday(year, 11, Weekday::Thu, 4)); // Thanksgiving
    days.extend(observed(NaiveDate::from_ymd_opt(year, 12, 25))); // Christmas

    days
}

/// Saturday holidays observe the preceding Friday, Sunday the following Monday.
fn observed(date: Option<NaiveDate>) -> Option<NaiveDate> {
    let date = date?;
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n as u8)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    (1..=5)
        .rev()
        .find_map(|n| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n))
}

/// Gregorian Easter (anonymous computus).
fn easter(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
