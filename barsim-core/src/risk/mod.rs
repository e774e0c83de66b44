//! Risk policy: validates every signal against the configured limits.
//!
//! Closing signals only need a matching position to close. Opening and
//! increase signals run through the limit checks in a fixed order:
//!
//! a. per-symbol position size
//! b. aggregate exposure
//! c. drawdown from peak
//! d. daily loss halt
//! e. stop-implied loss per trade
//! f. max open positions
//! g. max trades per day
//!
//! The first reject short-circuits. Size checks (a, b, e) resize instead of
//! rejecting when `resize_on_violation` is set, and later checks see the
//! resized size. The policy reads the ledger and never mutates it; the only
//! state it keeps is the current UTC day's bookkeeping.

pub mod decision;
pub mod limits;

pub use decision::{RejectReason, ResizeReason, RiskDecision, RiskOutcome};

use crate::config::BacktestConfig;
use crate::domain::order::floor_to_increment;
use crate::domain::{PortfolioLedger, Signal};
use chrono::{DateTime, NaiveDate, Utc};
use limits::{Check, Exposure};
use rust_decimal::Decimal;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RiskPolicy {
    config: BacktestConfig,
    day: Option<NaiveDate>,
    day_start_equity: Decimal,
    halted: bool,
    trades_today: usize,
}

impl RiskPolicy {
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            config: config.clone(),
            day: None,
            day_start_equity: config.initial_balance,
            halted: false,
            trades_today: 0,
        }
    }

    /// Whether the daily loss limit has halted new exposure for the current day.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn trades_today(&self) -> usize {
        self.trades_today
    }

    /// Roll the day bookkeeping when `timestamp` starts a new UTC day.
    ///
    /// Called before the bar is marked, so the day's starting equity is the
    /// previous close.
    pub fn begin_bar(&mut self, timestamp: DateTime<Utc>, ledger: &PortfolioLedger) {
        let today = timestamp.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.day_start_equity = ledger.equity();
            self.halted = false;
            self.trades_today = 0;
        }
    }

    /// Detect a daily loss breach from the bar's marks and fills.
    pub fn end_bar(&mut self, ledger: &PortfolioLedger) {
        self.check_daily_loss(ledger);
    }

    pub fn record_fill(&mut self) {
        self.trades_today += 1;
    }

    fn check_daily_loss(&mut self, ledger: &PortfolioLedger) -> bool {
        if let Some(limit) = self.config.daily_loss_limit_pct {
            let loss = limits::daily_loss(self.day_start_equity, ledger.equity());
            if !self.halted && loss >= limit {
                warn!(loss = %loss, limit = %limit, "daily loss limit breached, halting new exposure");
                self.halted = true;
            }
        }
        self.halted
    }

    /// Evaluate a signal against the ledger as it stands right now.
    pub fn evaluate(&mut self, signal: &Signal, ledger: &PortfolioLedger) -> RiskDecision {
        let id = signal.id;
        if signal.size <= Decimal::ZERO {
            return RiskDecision::reject(id, RejectReason::InvalidSize { size: signal.size });
        }
        let Some(price) = ledger.mark_price(&signal.symbol) else {
            return RiskDecision::reject(id, RejectReason::NoMarketPrice);
        };
        if signal.size.checked_mul(price).is_none() {
            return RiskDecision::reject(id, RejectReason::InvalidSize { size: signal.size });
        }

        let position = ledger.position_of(&signal.symbol);
        let side = signal.intent.position_side();

        if signal.intent.is_closing() {
            return match position {
                Some(pos) if pos.side == side => {
                    if signal.size > pos.size {
                        RiskDecision {
                            signal_id: id,
                            outcome: RiskOutcome::Resize {
                                requested: signal.size,
                                approved: pos.size,
                                reason: ResizeReason::ClampedToPosition,
                            },
                        }
                    } else {
                        RiskDecision::accept(id)
                    }
                }
                _ => RiskDecision::reject(id, RejectReason::NoPositionToClose),
            };
        }

        match self.evaluate_opening(signal, ledger, price) {
            Ok((_, None)) => RiskDecision::accept(id),
            Ok((approved, Some(reason))) => RiskDecision {
                signal_id: id,
                outcome: RiskOutcome::Resize {
                    requested: signal.size,
                    approved,
                    reason,
                },
            },
            Err(reason) => RiskDecision::reject(id, reason),
        }
    }

    /// Checks a to g for an opening or increase signal. Returns the approved
    /// size and the last resize reason, if any check shrank it.
    fn evaluate_opening(
        &mut self,
        signal: &Signal,
        ledger: &PortfolioLedger,
        price: Decimal,
    ) -> Result<(Decimal, Option<ResizeReason>), RejectReason> {
        let equity = ledger.equity();
        if equity <= Decimal::ZERO {
            return Err(RejectReason::EquityDepleted { equity });
        }
        let position = ledger.position_of(&signal.symbol);
        let ctx = Exposure::new(position, signal.intent.position_side(), price, equity);
        let mut size = signal.size;
        let mut resized = None;

        let check = limits::position_limit(
            size,
            &ctx,
            self.config.max_position_size,
            self.config.max_position_pct,
        );
        self.apply(check, &mut size, &mut resized)?;

        let check = limits::exposure_limit(size, &ctx, ledger, self.config.max_exposure_pct);
        self.apply(check, &mut size, &mut resized)?;

        self.apply(
            limits::drawdown(ledger, self.config.max_drawdown_pct),
            &mut size,
            &mut resized,
        )?;

        if self.check_daily_loss(ledger) {
            return Err(RejectReason::DailyLossHalt);
        }

        let check = limits::trade_loss(
            size,
            &ctx,
            signal.stop_price,
            self.config.max_trade_loss_pct,
        );
        self.apply(check, &mut size, &mut resized)?;

        if let Some(limit) = self.config.max_open_positions {
            if position.is_none() && ledger.open_positions() >= limit {
                return Err(RejectReason::MaxOpenPositions { limit });
            }
        }
        if let Some(limit) = self.config.max_trades_per_day {
            if self.trades_today >= limit {
                return Err(RejectReason::MaxTradesPerDay { limit });
            }
        }
        Ok((size, resized))
    }

    /// Fold one check into the running size under the resize policy.
    fn apply(
        &self,
        check: Check,
        size: &mut Decimal,
        resized: &mut Option<ResizeReason>,
    ) -> Result<(), RejectReason> {
        match check {
            Check::Pass => Ok(()),
            Check::Reject(reason) => Err(reason),
            Check::TooLarge {
                allowed,
                reason,
                reject,
            } => {
                if !self.config.resize_on_violation {
                    return Err(reject);
                }
                let shrunk = floor_to_increment(allowed, self.config.size_increment);
                if shrunk <= Decimal::ZERO {
                    return Err(reject);
                }
                *size = shrunk;
                *resized = Some(reason);
                Ok(())
            }
        }
    }
}
