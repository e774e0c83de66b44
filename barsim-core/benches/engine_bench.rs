//! Criterion benchmarks for BarSim hot paths.
//!
//! Benchmarks:
//! 1. Bar event loop (full backtest iteration, single and multi-symbol)
//! 2. Feed merge (k-way merge of interleaved symbol series)
//! 3. Risk evaluation (all limits enabled)
//! 4. Execution simulation (fill pricing with stochastic slippage)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use barsim_core::config::BacktestConfig;
use barsim_core::data::BarFeed;
use barsim_core::domain::{Bar, Order, PortfolioLedger, Signal};
use barsim_core::engine::{Backtest, ExecutionSimulator, SlippageModel};
use barsim_core::risk::RiskPolicy;
use barsim_core::strategy::{Strategy, StrategyError};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize, symbol: &str) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = Decimal::from_f64(100.0 + (i as f64 * 0.1).sin() * 10.0)
                .unwrap_or(Decimal::ONE_HUNDRED)
                .round_dp(2);
            Bar::new(
                symbol,
                start + Duration::days(i as i64),
                close - Decimal::new(3, 1),
                close + Decimal::new(15, 1),
                close - Decimal::new(15, 1),
                close,
                Decimal::from(1_000_000 + (i % 500_000) as i64),
            )
        })
        .collect()
}

fn make_multi(n: usize, symbols: usize) -> Vec<Bar> {
    (0..symbols)
        .flat_map(|s| make_bars(n, &format!("SYM{s:02}")))
        .collect()
}

fn bench_config() -> BacktestConfig {
    BacktestConfig {
        initial_balance: Decimal::from(100_000),
        slippage_model: SlippageModel::RandomBps {
            max_bps: Decimal::from(5),
        },
        max_position_pct: Some(Decimal::new(2, 1)),
        max_exposure_pct: Some(Decimal::ONE),
        max_drawdown_pct: Some(Decimal::new(5, 1)),
        ..Default::default()
    }
}

/// Flips in and out of a long position every `period` bars per symbol.
struct Alternator {
    period: usize,
    seen: usize,
}

impl Strategy for Alternator {
    fn id(&self) -> &str {
        "alternator"
    }

    fn on_bar(&mut self, bar: &Bar, ledger: &PortfolioLedger) -> Result<Vec<Signal>, StrategyError> {
        self.seen += 1;
        if self.seen % self.period != 0 {
            return Ok(Vec::new());
        }
        Ok(match ledger.position_of(&bar.symbol) {
            Some(pos) => vec![Signal::close_long(&bar.symbol, pos.size)],
            None => vec![Signal::open_long(&bar.symbol, Decimal::from(10))],
        })
    }
}

// ── 1. Bar Event Loop ────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_event_loop");

    for &bar_count in &[252, 1260, 2520] {
        let bars = make_bars(bar_count, "SPY");
        group.bench_with_input(
            BenchmarkId::new("alternator", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    let mut backtest = Backtest::new(bench_config())
                        .unwrap()
                        .with_strategy(Alternator { period: 5, seen: 0 });
                    backtest.run(black_box(&bars))
                });
            },
        );
    }

    // Multi-symbol benchmark (the realistic case)
    let bars_10 = make_multi(1260, 10);
    group.bench_function("10_symbols_1260_bars", |b| {
        b.iter(|| {
            let mut backtest = Backtest::new(bench_config())
                .unwrap()
                .with_strategy(Alternator { period: 7, seen: 0 });
            backtest.run(black_box(&bars_10))
        });
    });

    group.finish();
}

// ── 2. Feed Merge ────────────────────────────────────────────────────

fn bench_feed(c: &mut Criterion) {
    let bars = make_multi(1260, 10);
    c.bench_function("feed_merge_10x1260", |b| {
        b.iter(|| BarFeed::new(black_box(bars.clone())).filter_map(Result::ok).count());
    });
}

// ── 3. Risk Evaluation ───────────────────────────────────────────────

fn bench_risk(c: &mut Criterion) {
    let config = BacktestConfig {
        max_trade_loss_pct: Some(Decimal::new(1, 2)),
        daily_loss_limit_pct: Some(Decimal::new(5, 2)),
        max_open_positions: Some(20),
        max_trades_per_day: Some(100),
        ..bench_config()
    };
    let mut ledger = PortfolioLedger::new(config.initial_balance);
    for s in 0..10 {
        ledger.mark(&format!("SYM{s:02}"), Decimal::ONE_HUNDRED);
    }
    let signal = Signal::open_long("SYM03", Decimal::from(500)).with_stop(Decimal::from(95));

    c.bench_function("risk_evaluate_all_limits", |b| {
        let mut policy = RiskPolicy::new(&config);
        b.iter(|| policy.evaluate(black_box(&signal), black_box(&ledger)));
    });
}

// ── 4. Execution Simulation ──────────────────────────────────────────

fn bench_execution(c: &mut Criterion) {
    let config = bench_config();
    let bar = make_bars(1, "SPY").remove(0);
    let order = Order::from_signal(&Signal::open_long("SPY", Decimal::from(10)), Decimal::from(10));

    c.bench_function("simulate_market_fill", |b| {
        let mut simulator = ExecutionSimulator::new(&config);
        b.iter(|| simulator.simulate(black_box(&order), black_box(&bar)));
    });
}

criterion_group!(benches, bench_bar_loop, bench_feed, bench_risk, bench_execution);
criterion_main!(benches);
