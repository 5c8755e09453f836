//! Gap filling: join realized bars onto the expected-timestamp grid.
//!
//! Grid slots with no realized bar become synthetic flat bars at the
//! forward-filled close, with zero volume. Slots before the first realized
//! close have nothing to fill from and become void bars; consumers drop
//! those by range intersection instead of inventing prices.

use crate::domain::Bar;
use chrono::DateTime;
use chrono_tz::Tz;

/// Fill one ticker's bars onto its grid.
///
/// `grid` must be sorted ascending and de-duplicated; `bars` must be
/// sorted by timestamp. Output has exactly one bar per grid slot. Realized
/// bars that fall off-grid are ignored — the grid is the contract for
/// which timestamps exist at this granularity.
pub fn fill_gaps(ticker: &str, grid: &[DateTime<Tz>], bars: &[Bar]) -> Vec<Bar> {
    let mut out = Vec::with_capacity(grid.len());
    let mut cursor = 0usize;
    let mut last_close: Option<f64> = None;

    for &slot in grid {
        while cursor < bars.len() && bars[cursor].ts < slot {
            cursor += 1;
        }
        if cursor < bars.len() && bars[cursor].ts == slot {
            let bar = &bars[cursor];
            last_close = Some(bar.close);
            out.push(Bar {
                ticker: ticker.to_string(),
                ..bar.clone()
            });
            cursor += 1;
        } else {
            match last_close {
                Some(close) => out.push(Bar::flat(ticker, slot, close)),
                None => out.push(Bar::void(ticker, slot)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MARKET_TZ;
    use chrono::TimeZone;

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Tz> {
        MARKET_TZ.with_ymd_and_hms(2021, 1, d, h, m, 0).unwrap()
    }

    fn bar(d: u32, h: u32, m: u32, close: f64) -> Bar {
        Bar {
            ticker: "AAA".into(),
            ts: ts(d, h, m),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
            transactions: 7,
        }
    }

    #[test]
    fn output_length_matches_grid_length() {
        let grid = vec![ts(4, 0, 0), ts(5, 0, 0), ts(6, 0, 0), ts(7, 0, 0)];
        let bars = vec![bar(4, 0, 0, 10.0), bar(6, 0, 0, 12.0)];

        let filled = fill_gaps("AAA", &grid, &bars);
        assert_eq!(filled.len(), grid.len());
    }

    #[test]
    fn missing_slots_become_flat_bars_at_the_carried_close() {
        let grid = vec![ts(4, 0, 0), ts(5, 0, 0), ts(6, 0, 0)];
        let bars = vec![bar(4, 0, 0, 10.0), bar(6, 0, 0, 12.0)];

        let filled = fill_gaps("AAA", &grid, &bars);
        let gap = &filled[1];
        assert_eq!(gap.open, 10.0);
        assert_eq!(gap.high, 10.0);
        assert_eq!(gap.low, 10.0);
        assert_eq!(gap.close, 10.0);
        assert_eq!(gap.volume, 0);
        assert_eq!(gap.transactions, 0);
        // The realized bar after the gap is untouched.
        assert_eq!(filled[2].close, 12.0);
        assert_eq!(filled[2].volume, 100);
    }

    #[test]
    fn slots_before_the_first_close_stay_void() {
        let grid = vec![ts(4, 0, 0), ts(5, 0, 0), ts(6, 0, 0)];
        let bars = vec![bar(5, 0, 0, 11.0)];

        let filled = fill_gaps("AAA", &grid, &bars);
        assert!(filled[0].is_void());
        assert!(!filled[1].is_void());
        assert_eq!(filled[2].close, 11.0);
        assert_eq!(filled[2].volume, 0);
    }

    #[test]
    fn consecutive_gaps_carry_the_same_close() {
        let grid = vec![ts(4, 0, 0), ts(5, 0, 0), ts(6, 0, 0), ts(7, 0, 0)];
        let bars = vec![bar(4, 0, 0, 10.0)];

        let filled = fill_gaps("AAA", &grid, &bars);
        assert!(filled[1..].iter().all(|b| b.close == 10.0 && b.volume == 0));
    }

    #[test]
    fn off_grid_bars_are_ignored_and_do_not_feed_the_fill() {
        let grid = vec![ts(4, 0, 0), ts(6, 0, 0)];
        // 2021-01-05 is not a grid slot at this granularity.
        let bars = vec![bar(4, 0, 0, 10.0), bar(5, 0, 0, 99.0)];

        let filled = fill_gaps("AAA", &grid, &bars);
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[1].close, 10.0);
    }

    #[test]
    fn empty_grid_yields_empty_output() {
        let filled = fill_gaps("AAA", &[], &[bar(4, 0, 0, 10.0)]);
        assert!(filled.is_empty());
    }

    #[test]
    fn relabels_to_the_requested_ticker() {
        let grid = vec![ts(4, 0, 0)];
        let bars = vec![bar(4, 0, 0, 10.0)];
        let filled = fill_gaps("ZZZ", &grid, &bars);
        assert_eq!(filled[0].ticker, "ZZZ");
    }
}
