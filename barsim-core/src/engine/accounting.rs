//! Per-bar ledger snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger state at the close of one bar, taken after every fill for that bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub position_value: Decimal,
    pub equity: Decimal,
    pub drawdown: Decimal,
    pub open_positions: usize,
}

impl LedgerSnapshot {
    /// `equity == cash + position_value`, exact in decimal arithmetic.
    pub fn is_balanced(&self) -> bool {
        self.equity == self.cash + self.position_value
    }
}

/// Equity curve from a snapshot series.
pub fn equity_curve(snapshots: &[LedgerSnapshot]) -> Vec<Decimal> {
    snapshots.iter().map(|s| s.equity).collect()
}

/// Largest drawdown observed across a snapshot series.
pub fn max_drawdown(snapshots: &[LedgerSnapshot]) -> Decimal {
    snapshots
        .iter()
        .map(|s| s.drawdown)
        .max()
        .unwrap_or(Decimal::ZERO)
}
