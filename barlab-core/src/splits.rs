//! Split back-adjustment.
//!
//! Historical prices are rescaled so every bar is expressed in the share
//! count implied by the most recent split: each bar looks *forward* to the
//! nearest split factor at or after its date. Prices multiply by the
//! cumulative ratio, volume divides by it.

use crate::domain::Bar;
use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};

/// One corporate-action split event from the vendor feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitEvent {
    pub ticker: String,
    pub execution_date: NaiveDate,
    pub split_from: f64,
    pub split_to: f64,
}

/// One point on a ticker's cumulative factor timeline: bars dated at or
/// before `effective_date` (and after the previous entry) scale by
/// `cumulative_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorEntry {
    pub effective_date: NaiveDate,
    pub cumulative_factor: f64,
}

/// Build per-ticker factor timelines, ascending by effective date.
///
/// The effective date is the last trading-relevant date *before* the
/// split executes (`execution_date - 1 day`). Factors are the backward
/// cumulative product of `split_from / split_to`, so the entry for a date
/// carries the product of every split at or after it. Events sharing a
/// ticker and date collapse to the last cumulative factor.
pub fn factor_timelines(splits: &[SplitEvent]) -> HashMap<String, Vec<FactorEntry>> {
    let mut by_ticker: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
    for split in splits {
        if split.split_from <= 0.0 || split.split_to <= 0.0 {
            eprintln!(
                "WARNING: ignoring malformed split for {} on {} ({}:{})",
                split.ticker, split.execution_date, split.split_from, split.split_to
            );
            continue;
        }
        by_ticker.entry(split.ticker.clone()).or_default().push((
            split.execution_date - Duration::days(1),
            split.split_from / split.split_to,
        ));
    }

    let mut timelines = HashMap::with_capacity(by_ticker.len());
    for (ticker, mut events) in by_ticker {
        // Newest first, so the running product accumulates backward.
        events.sort_by(|a, b| b.0.cmp(&a.0));
        let mut cumulative = 1.0;
        let mut entries: Vec<FactorEntry> = events
            .into_iter()
            .map(|(effective_date, ratio)| {
                cumulative *= ratio;
                FactorEntry {
                    effective_date,
                    cumulative_factor: cumulative,
                }
            })
            .collect();

        // Stable ascending re-sort keeps same-date entries in accumulation
        // order; the last one (the full same-day product) wins.
        entries.sort_by_key(|e| e.effective_date);
        let mut collapsed: Vec<FactorEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match collapsed.last_mut() {
                Some(prev) if prev.effective_date == entry.effective_date => *prev = entry,
                _ => collapsed.push(entry),
            }
        }
        timelines.insert(ticker, collapsed);
    }
    timelines
}

/// Back-adjust bars for splits. Identity transform when no split falls in
/// `[min(bar date) - 1 day, max(bar date) + 1 day]` for the bar tickers.
pub fn adjust(bars: Vec<Bar>, splits: &[SplitEvent], price_decimals: u32) -> Vec<Bar> {
    let Some(min_date) = bars.iter().map(Bar::trade_date).min() else {
        return bars;
    };
    let max_date = bars.iter().map(Bar::trade_date).max().unwrap_or(min_date);
    let window = (min_date - Duration::days(1), max_date + Duration::days(1));

    let tickers: HashSet<&str> = bars.iter().map(|b| b.ticker.as_str()).collect();
    let in_scope: Vec<SplitEvent> = splits
        .iter()
        .filter(|s| {
            tickers.contains(s.ticker.as_str())
                && s.execution_date >= window.0
                && s.execution_date <= window.1
        })
        .cloned()
        .collect();
    if in_scope.is_empty() {
        return bars;
    }

    let timelines = factor_timelines(&in_scope);
    bars.into_iter()
        .map(|bar| {
            let factor = timelines
                .get(&bar.ticker)
                .map(|tl| factor_for(tl, bar.trade_date()))
                .unwrap_or(1.0);
            apply_factor(bar, factor, price_decimals)
        })
        .collect()
}

/// Factor from the nearest timeline entry with `effective_date >= date`;
/// bars past the last split are already in current terms (factor 1).
fn factor_for(timeline: &[FactorEntry], date: NaiveDate) -> f64 {
    let idx = timeline.partition_point(|e| e.effective_date < date);
    timeline.get(idx).map(|e| e.cumulative_factor).unwrap_or(1.0)
}

fn apply_factor(mut bar: Bar, factor: f64, price_decimals: u32) -> Bar {
    if factor == 1.0 {
        return bar;
    }
    bar.open = round_to(bar.open * factor, price_decimals);
    bar.high = round_to(bar.high * factor, price_decimals);
    bar.low = round_to(bar.low * factor, price_decimals);
    bar.close = round_to(bar.close * factor, price_decimals);
    bar.volume = (bar.volume as f64 / factor).round() as u64;
    bar
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
