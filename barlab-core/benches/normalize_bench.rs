//! Criterion benchmarks for normalization hot paths.
//!
//! Benchmarks:
//! 1. Minute-grid generation (one month, full extended hours)
//! 2. Gap filling a sparse month of minute bars
//! 3. Session resampling one month of minute bars to 5m
//! 4. Split factor lookup over a dense event history

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use barlab_core::calendar::{build_grid, XnysCalendar};
use barlab_core::domain::Bar;
use barlab_core::gapfill::fill_gaps;
use barlab_core::resample::resample;
use barlab_core::splits::{adjust, SplitEvent};
use barlab_core::timeframe::Granularity;
use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;

// ── Helpers ──────────────────────────────────────────────────────────

fn month_grid(full_hour: bool) -> Vec<DateTime<Tz>> {
    build_grid(
        &XnysCalendar,
        NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
        Granularity::Minute,
        full_hour,
    )
}

/// Realize every third grid slot as a traded minute.
fn sparse_bars(grid: &[DateTime<Tz>]) -> Vec<Bar> {
    grid.iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 0)
        .map(|(i, ts)| {
            let close = 100.0 + (i as f64 * 0.01).sin() * 5.0;
            Bar {
                ticker: "BENCH".to_string(),
                ts: *ts,
                open: close - 0.05,
                high: close + 0.2,
                low: close - 0.2,
                close,
                volume: 1_000 + (i as u64 % 500),
                transactions: 10,
            }
        })
        .collect()
}

fn bench_build_grid(c: &mut Criterion) {
    c.bench_function("grid_month_minute_full_hour", |b| {
        b.iter(|| black_box(month_grid(true)))
    });
}

fn bench_gap_fill(c: &mut Criterion) {
    let grid = month_grid(false);
    let bars = sparse_bars(&grid);
    c.bench_function("gap_fill_month_minute", |b| {
        b.iter(|| black_box(fill_gaps("BENCH", &grid, &bars)))
    });
}

fn bench_resample(c: &mut Criterion) {
    let grid = month_grid(false);
    let bars = fill_gaps("BENCH", &grid, &sparse_bars(&grid));
    c.bench_function("resample_month_to_5m", |b| {
        b.iter(|| black_box(resample(&bars, 5)))
    });
}

fn bench_split_adjust(c: &mut Criterion) {
    let grid = month_grid(false);
    let bars = fill_gaps("BENCH", &grid, &sparse_bars(&grid));
    let splits: Vec<SplitEvent> = (0..8)
        .map(|i| SplitEvent {
            ticker: "BENCH".to_string(),
            execution_date: NaiveDate::from_ymd_opt(2021, 3, 2).unwrap() + Duration::days(i * 4),
            split_from: 1.0,
            split_to: 2.0,
        })
        .collect();
    c.bench_function("split_adjust_month", |b| {
        b.iter(|| black_box(adjust(bars.clone(), &splits, 4)))
    });
}

criterion_group!(
    benches,
    bench_build_grid,
    bench_gap_fill,
    bench_resample,
    bench_split_adjust
);
criterion_main!(benches);
