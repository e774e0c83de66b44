//! Performance metrics: pure functions over a run's snapshots and audit.
//!
//! The engine keeps money in `Decimal`; statistics here are `f64`. Every
//! metric is a pure function of its inputs and returns 0.0 for degenerate
//! series (fewer than two points, zero variance).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use barsim_core::audit::AuditTrail;
use barsim_core::engine::LedgerSnapshot;

/// Periods per year used to annualise per-bar statistics for daily bars.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Largest peak-to-trough loss as a positive fraction.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Fills that reduced or closed a position.
    pub trade_count: usize,
    pub fill_count: usize,
    pub total_fees: f64,
    pub total_slippage: f64,
    pub rejected_signals: usize,
    pub aborted_fills: usize,
    pub strategy_faults: usize,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl PerformanceMetrics {
    pub fn compute(snapshots: &[LedgerSnapshot], audit: &AuditTrail, initial_balance: Decimal) -> Self {
        Self::compute_with(snapshots, audit, initial_balance, DEFAULT_PERIODS_PER_YEAR)
    }

    /// Same as `compute` with an explicit annualisation factor (e.g. 365 for
    /// crypto daily bars, 252 * 390 for equity minute bars).
    pub fn compute_with(
        snapshots: &[LedgerSnapshot],
        audit: &AuditTrail,
        initial_balance: Decimal,
        periods_per_year: f64,
    ) -> Self {
        // The curve starts at the initial balance so the first bar's move counts.
        let curve: Vec<f64> = std::iter::once(to_f64(initial_balance))
            .chain(snapshots.iter().map(|s| to_f64(s.equity)))
            .collect();
        let closed: Vec<f64> = audit
            .fills()
            .filter(|f| f.closed_size > Decimal::ZERO)
            .map(|f| to_f64(f.realized_pnl))
            .collect();

        Self {
            final_equity: curve.last().copied().unwrap_or(0.0),
            total_return: total_return(&curve),
            cagr: cagr(&curve, periods_per_year),
            sharpe: sharpe_ratio(&curve, periods_per_year),
            sortino: sortino_ratio(&curve, periods_per_year),
            max_drawdown: max_drawdown(&curve),
            win_rate: win_rate(&closed),
            profit_factor: profit_factor(&closed),
            trade_count: closed.len(),
            fill_count: audit.fills().count(),
            total_fees: audit.fills().map(|f| to_f64(f.fee)).sum(),
            total_slippage: audit.fills().map(|f| to_f64(f.slippage)).sum(),
            rejected_signals: audit.rejected_count(),
            aborted_fills: audit.aborted_count(),
            strategy_faults: audit.fault_count(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_return(curve: &[f64]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(&first), Some(&last)) if curve.len() >= 2 && first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

pub fn cagr(curve: &[f64], periods_per_year: f64) -> f64 {
    let (Some(&first), Some(&last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if curve.len() < 3 || first <= 0.0 || last <= 0.0 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let years = (curve.len() - 1) as f64 / periods_per_year;
    (last / first).powf(1.0 / years) - 1.0
}

/// Simple returns between consecutive points; zero-equity points yield 0.
pub fn period_returns(curve: &[f64]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation.
fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// Annualised Sharpe ratio with a zero risk-free rate.
pub fn sharpe_ratio(curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&returns) / std * periods_per_year.sqrt()
}

/// Annualised Sortino ratio (downside deviation only).
pub fn sortino_ratio(curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside <= 0.0 {
        return 0.0;
    }
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean(&returns) / downside_std * periods_per_year.sqrt()
}

pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &eq in curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            worst = worst.max((peak - eq) / peak);
        }
    }
    worst
}

/// Fraction of closing fills with positive realized PnL (before fees).
pub fn win_rate(closed_pnl: &[f64]) -> f64 {
    if closed_pnl.is_empty() {
        return 0.0;
    }
    closed_pnl.iter().filter(|&&p| p > 0.0).count() as f64 / closed_pnl.len() as f64
}

/// Gross profit over gross loss, capped at 100.
pub fn profit_factor(closed_pnl: &[f64]) -> f64 {
    let profit: f64 = closed_pnl.iter().filter(|&&p| p > 0.0).sum();
    let loss: f64 = closed_pnl.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if loss < 1e-10 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}
