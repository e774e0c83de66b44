//! PortfolioLedger: cash, open positions and marks for one run.

use super::fill::Fill;
use super::position::Position;
use crate::engine::accounting::LedgerSnapshot;
use crate::engine::portfolio_update::{plan_fill, Transition};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Slack allowed on the PnL identity. Average-price division is the only
/// inexact step, and it stays far below this at 28 significant digits.
const PNL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Why the ledger refused a fill or failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid fill for {symbol}: {reason}")]
    InvalidFill { symbol: String, reason: String },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("negative cash balance {cash}")]
    NegativeCash { cash: Decimal },

    #[error("zero-size position left for {symbol}")]
    ZeroPosition { symbol: String },

    #[error("position {symbol} marked at {position_mark}, ledger mark is {ledger_mark:?}")]
    StaleMark {
        symbol: String,
        position_mark: Decimal,
        ledger_mark: Option<Decimal>,
    },

    #[error("pnl identity broken: realized - fees + unrealized = {pnl}, equity change = {equity_change}")]
    PnlIdentity {
        pnl: Decimal,
        equity_change: Decimal,
    },
}

/// Cash-settled portfolio ledger.
///
/// Mutated only by [`apply_fill`](Self::apply_fill) and marking. Equity is
/// never cached: `equity == cash + Σ(signed size × last mark)` by construction.
/// Positions are keyed in a `BTreeMap` so every iteration is in symbol order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLedger {
    initial_balance: Decimal,
    cash: Decimal,
    positions: BTreeMap<String, Position>,
    marks: BTreeMap<String, Decimal>,
    peak_equity: Decimal,
    realized_pnl: Decimal,
    total_fees: Decimal,
    total_slippage: Decimal,
    fill_count: u64,
}

impl PortfolioLedger {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            cash: initial_balance,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            peak_equity: initial_balance,
            realized_pnl: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
            fill_count: 0,
        }
    }

    // ── Mutation ──

    /// Apply a fill atomically: cash and position move together or not at all.
    ///
    /// Returns the fill with `realized_pnl` and `closed_size` attributed.
    /// A fill that would drive cash below zero is refused without touching
    /// any state.
    pub fn apply_fill(&mut self, mut fill: Fill) -> Result<Fill, LedgerError> {
        let symbol = fill.order.symbol.clone();
        if fill.size <= Decimal::ZERO {
            return Err(LedgerError::InvalidFill {
                symbol,
                reason: format!("size {} must be positive", fill.size),
            });
        }
        if fill.price <= Decimal::ZERO {
            return Err(LedgerError::InvalidFill {
                symbol,
                reason: format!("price {} must be positive", fill.price),
            });
        }
        if fill.fee < Decimal::ZERO {
            return Err(LedgerError::InvalidFill {
                symbol,
                reason: format!("fee {} must not be negative", fill.fee),
            });
        }

        let Some(new_cash) = fill.cash_delta().and_then(|delta| self.cash.checked_add(delta)) else {
            return Err(LedgerError::InvalidFill {
                symbol,
                reason: format!("notional of {} at {} overflows", fill.size, fill.price),
            });
        };
        if new_cash < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds {
                required: self.cash - new_cash,
                available: self.cash,
            });
        }

        let plan = plan_fill(
            self.positions.get(&symbol),
            fill.order.side,
            fill.size,
            fill.price,
        );
        let mark = self.marks.get(&symbol).copied().unwrap_or(fill.price);

        // Validation is done; from here on every step succeeds.
        self.cash = new_cash;
        self.realized_pnl += plan.realized_pnl;
        self.total_fees += fill.fee;
        self.total_slippage += fill.slippage;
        self.fill_count += 1;
        self.marks.insert(symbol.clone(), mark);

        match (plan.transition, plan.resulting) {
            (Transition::Closed, _) | (_, None) => {
                self.positions.remove(&symbol);
            }
            (Transition::Opened | Transition::Flipped, Some(res)) => {
                let mut position = Position {
                    symbol: symbol.clone(),
                    side: res.side,
                    size: res.size,
                    avg_entry_price: res.avg_entry_price,
                    last_price: mark,
                    realized_pnl: Decimal::ZERO,
                    opened_at: fill.timestamp,
                    stop_price: fill.order.stop_price,
                    take_profit: fill.order.take_profit,
                    trailing_stop_pct: fill.order.trailing_stop_pct,
                    trailing_stop: None,
                };
                position.trail(fill.price);
                self.positions.insert(symbol.clone(), position);
            }
            (Transition::Increased | Transition::Reduced, Some(res)) => {
                if let Some(pos) = self.positions.get_mut(&symbol) {
                    pos.size = res.size;
                    pos.avg_entry_price = res.avg_entry_price;
                    pos.realized_pnl += plan.realized_pnl;
                    if plan.transition == Transition::Increased {
                        if fill.order.stop_price.is_some() {
                            pos.stop_price = fill.order.stop_price;
                        }
                        if fill.order.take_profit.is_some() {
                            pos.take_profit = fill.order.take_profit;
                        }
                        if fill.order.trailing_stop_pct.is_some() {
                            pos.trailing_stop_pct = fill.order.trailing_stop_pct;
                            pos.trail(fill.price);
                        }
                    }
                }
            }
        }

        fill.realized_pnl = plan.realized_pnl;
        fill.closed_size = plan.closed_size;
        Ok(fill)
    }

    /// Record the latest price for a symbol and re-mark any open position.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        self.marks.insert(symbol.to_string(), price);
        if let Some(pos) = self.positions.get_mut(symbol) {
            pos.mark(price);
        }
    }

    /// Ratchet the symbol's trailing stop to its current mark.
    pub fn trail_stop(&mut self, symbol: &str) {
        if let (Some(pos), Some(price)) = (self.positions.get_mut(symbol), self.marks.get(symbol)) {
            pos.trail(*price);
        }
    }

    pub fn mark_to_market<'a>(&mut self, prices: impl IntoIterator<Item = (&'a str, Decimal)>) {
        for (symbol, price) in prices {
            self.mark(symbol, price);
        }
    }

    /// Snapshot the ledger at the end of a bar, advancing the equity peak.
    pub fn snapshot(&mut self, bar_index: usize, timestamp: DateTime<Utc>) -> LedgerSnapshot {
        let equity = self.equity();
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        LedgerSnapshot {
            bar_index,
            timestamp,
            cash: self.cash,
            position_value: self.position_value(),
            equity,
            drawdown: self.drawdown(),
            open_positions: self.positions.len(),
        }
    }

    // ── Queries ──

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Net signed value of all positions at their last marks.
    pub fn position_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn equity(&self) -> Decimal {
        self.cash + self.position_value()
    }

    /// Gross exposure: Σ |market value|.
    pub fn exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value().abs()).sum()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// Fractional drawdown from the running equity peak (0.1 = 10 % below peak).
    pub fn drawdown(&self) -> Decimal {
        let equity = self.equity();
        let peak = self.peak_equity.max(equity);
        if peak <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (peak - equity) / peak
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    pub fn position_of(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn mark_price(&self, symbol: &str) -> Option<Decimal> {
        self.marks.get(symbol).copied()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn total_slippage(&self) -> Decimal {
        self.total_slippage
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }

    // ── Invariants ──

    /// Check every ledger invariant; the event loop calls this once per bar.
    pub fn verify(&self) -> Result<(), LedgerError> {
        if self.cash < Decimal::ZERO {
            return Err(LedgerError::NegativeCash { cash: self.cash });
        }
        for (symbol, pos) in &self.positions {
            if pos.size <= Decimal::ZERO {
                return Err(LedgerError::ZeroPosition {
                    symbol: symbol.clone(),
                });
            }
            let ledger_mark = self.marks.get(symbol).copied();
            if ledger_mark != Some(pos.last_price) {
                return Err(LedgerError::StaleMark {
                    symbol: symbol.clone(),
                    position_mark: pos.last_price,
                    ledger_mark,
                });
            }
        }
        let pnl = self.realized_pnl - self.total_fees + self.unrealized_pnl();
        let equity_change = self.equity() - self.initial_balance;
        if (pnl - equity_change).abs() > PNL_TOLERANCE {
            return Err(LedgerError::PnlIdentity { pnl, equity_change });
        }
        Ok(())
    }
}
