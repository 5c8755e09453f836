//! Merging bar history across a rename chain.
//!
//! Vendors keep publishing bars for a predecessor symbol past the rename
//! (stale feeds, relisted shells), so the member ranges can overlap. The
//! merge truncates each predecessor at its cutoff, starts each successor
//! strictly after the predecessor's realized last date, and re-labels
//! everything with the group's current symbol.

use super::IdentityGroup;
use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Merge per-ticker bar histories for one identity group into a single
/// non-overlapping history under `latest_ticker`.
///
/// `bars_by_ticker` values must be sorted by timestamp ascending. A member
/// with no bars remaining after truncation contributes nothing.
pub fn merge_group_bars(
    group: &IdentityGroup,
    mut bars_by_ticker: HashMap<String, Vec<Bar>>,
) -> Vec<Bar> {
    let mut merged: Vec<Bar> = Vec::new();
    let mut last_end_date: Option<NaiveDate> = None;
    let last_index = group.members.len().saturating_sub(1);

    for (i, member) in group.members.iter().enumerate() {
        let Some(mut bars) = bars_by_ticker.remove(&member.ticker) else {
            continue;
        };

        if i < last_index {
            let cutoff = member.cutoff();
            bars.retain(|b| b.trade_date() <= cutoff);
        }
        if let Some(prev_end) = last_end_date {
            bars.retain(|b| b.trade_date() > prev_end);
        }
        if bars.is_empty() {
            continue;
        }

        last_end_date = bars.iter().map(Bar::trade_date).max();
        merged.extend(bars);
    }

    for bar in &mut merged {
        bar.ticker = group.latest_ticker.clone();
    }
    merged.sort_by(|a, b| a.ts.cmp(&b.ts));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MARKET_TZ;
    use crate::identity::GroupMember;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn daily_bar(ticker: &str, y: i32, m: u32, d: u32, close: f64) -> Bar {
        Bar {
            ticker: ticker.into(),
            ts: MARKET_TZ.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
            transactions: 10,
        }
    }

    fn two_member_group() -> IdentityGroup {
        IdentityGroup {
            group_id: 0,
            members: vec![
                GroupMember {
                    ticker: "A".into(),
                    last_updated: utc(2020, 6, 10),
                    delisted_at: Some(utc(2020, 6, 1)),
                },
                GroupMember {
                    ticker: "B".into(),
                    last_updated: utc(2024, 1, 1),
                    delisted_at: None,
                },
            ],
            latest_ticker: "B".into(),
        }
    }

    #[test]
    fn predecessor_truncates_at_cutoff_and_successor_takes_over() {
        let group = two_member_group();
        let mut bars = HashMap::new();
        bars.insert(
            "A".to_string(),
            vec![
                daily_bar("A", 2020, 5, 28, 10.0),
                daily_bar("A", 2020, 5, 29, 11.0),
                // Stale feed rows after the delisting must vanish.
                daily_bar("A", 2020, 6, 2, 12.0),
                daily_bar("A", 2020, 6, 3, 13.0),
            ],
        );
        bars.insert(
            "B".to_string(),
            vec![
                // Overlaps A's kept range; dropped by the strictly-after rule.
                daily_bar("B", 2020, 5, 29, 110.0),
                daily_bar("B", 2020, 6, 1, 111.0),
                daily_bar("B", 2020, 6, 2, 112.0),
            ],
        );

        let merged = merge_group_bars(&group, bars);

        // No bars for A after its 2020-06-01 cutoff.
        assert!(merged
            .iter()
            .all(|b| b.trade_date() <= NaiveDate::from_ymd_opt(2020, 5, 29).unwrap()
                || b.close >= 100.0));
        // No duplicate timestamps.
        let stamps: HashSet<_> = merged.iter().map(|b| b.ts).collect();
        assert_eq!(stamps.len(), merged.len());
        // Everything is relabeled to the current symbol.
        assert!(merged.iter().all(|b| b.ticker == "B"));
        // A contributes 5/28 and 5/29; B contributes 6/1 and 6/2.
        let closes: Vec<f64> = merged.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 111.0, 112.0]);
    }

    #[test]
    fn empty_member_contributes_nothing() {
        let group = two_member_group();
        let mut bars = HashMap::new();
        // A's only bars postdate its cutoff and all get truncated away.
        bars.insert("A".to_string(), vec![daily_bar("A", 2020, 7, 1, 9.0)]);
        bars.insert("B".to_string(), vec![daily_bar("B", 2020, 7, 1, 99.0)]);

        let merged = merge_group_bars(&group, bars);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].close, 99.0);
        assert_eq!(merged[0].ticker, "B");
    }

    #[test]
    fn single_member_group_is_a_straight_rename() {
        let group = IdentityGroup {
            group_id: 0,
            members: vec![GroupMember {
                ticker: "FB".into(),
                last_updated: utc(2022, 6, 9),
                delisted_at: None,
            }],
            latest_ticker: "FB".into(),
        };
        let mut bars = HashMap::new();
        bars.insert("FB".to_string(), vec![daily_bar("FB", 2022, 6, 1, 200.0)]);

        let merged = merge_group_bars(&group, bars);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].ticker, "FB");
    }

    #[test]
    fn active_member_is_not_truncated_by_its_own_cutoff() {
        // B's master row was last refreshed 2024-01-01, but bars continue
        // past that date; the final member keeps them.
        let group = two_member_group();
        let mut bars = HashMap::new();
        bars.insert("B".to_string(), vec![daily_bar("B", 2024, 3, 1, 120.0)]);

        let merged = merge_group_bars(&group, bars);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].close, 120.0);
    }
}
