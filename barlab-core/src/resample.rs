//! Session-bounded resampling of minute bars into coarser buckets.
//!
//! Buckets are anchored at each session's fixed start (04:00 premarket,
//! 09:30 regular, 16:00 afterhours) rather than midnight, so a bucket can
//! never straddle a session boundary or a trading day. Bars outside the
//! named sessions pass through as their own single-bar buckets.

use crate::calendar::SessionKind;
use crate::domain::Bar;
use chrono::{DateTime, Duration, NaiveDate, Timelike};
use chrono_tz::Tz;

/// Classify a timestamp into its trading session, exchange-local.
/// The 09:00–09:30 boundary belongs to premarket.
fn classify(ts: &DateTime<Tz>) -> Option<SessionKind> {
    let hour = ts.hour();
    let minute = ts.minute();
    match hour {
        4..=8 => Some(SessionKind::Premarket),
        9 if minute < 30 => Some(SessionKind::Premarket),
        9..=15 => Some(SessionKind::Regular),
        16..=19 => Some(SessionKind::Afterhours),
        _ => None,
    }
}

fn anchor_time(kind: SessionKind) -> (u32, u32) {
    match kind {
        SessionKind::Premarket => (4, 0),
        SessionKind::Regular => (9, 30),
        SessionKind::Afterhours => (16, 0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketKey {
    date: NaiveDate,
    session: Option<SessionKind>,
    start: DateTime<Tz>,
}

/// Bucket start for one minute bar.
fn bucket_of(bar: &Bar, bar_minutes: u32) -> BucketKey {
    let date = bar.trade_date();
    let session = classify(&bar.ts);
    let start = match session {
        Some(kind) => {
            let (h, m) = anchor_time(kind);
            let anchor = crate::calendar::at_local(date, h, m);
            let minutes_since = (bar.ts - anchor).num_minutes();
            let index = minutes_since / bar_minutes as i64;
            anchor + Duration::minutes(index * bar_minutes as i64)
        }
        // Off-session bars keep their own timestamp: passed through, not dropped.
        None => bar.ts,
    };
    BucketKey {
        date,
        session,
        start,
    }
}

/// Aggregate minute bars into `bar_minutes`-wide session buckets.
///
/// Input must be sorted by (ticker, timestamp); one output bar is emitted
/// per non-empty bucket, sorted the same way. Open is first-by-time, close
/// last-by-time, high/low are extrema, volume and transactions sum. Void
/// bars (pre-listing grid slots) are skipped.
pub fn resample(bars: &[Bar], bar_minutes: u32) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(BucketKey, Bar)> = None;

    for bar in bars {
        if bar.is_void() {
            continue;
        }
        let key = bucket_of(bar, bar_minutes);

        match &mut current {
            Some((open_key, agg)) if *open_key == key && agg.ticker == bar.ticker => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                agg.transactions += bar.transactions;
            }
            _ => {
                if let Some((_, done)) = current.take() {
                    out.push(done);
                }
                current = Some((
                    key,
                    Bar {
                        ticker: bar.ticker.clone(),
                        ts: key.start,
                        ..bar.clone()
                    },
                ));
            }
        }
    }
    if let Some((_, done)) = current.take() {
        out.push(done);
    }

    out.sort_by(|a, b| a.ticker.cmp(&b.ticker).then_with(|| a.ts.cmp(&b.ts)));
    out
}
