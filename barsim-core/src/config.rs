//! Static backtest configuration.
//!
//! One `BacktestConfig` is handed to every component of a run at construction.
//! Percentages are fractions (0.05 = 5 %). Every limit is optional; an unset
//! limit is simply not checked.

use crate::domain::ids::ContentHash;
use crate::engine::execution::{CostModel, ReferencePrice, SlippageModel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the event loop does when a strategy fails on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyErrorPolicy {
    /// Stop the run after recording the fault.
    #[default]
    Halt,
    /// Record the fault, execute nothing from that bar, and keep going.
    SkipBar,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("initial_balance must be positive, got {0}")]
    NonPositiveBalance(Decimal),

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: Decimal },

    #[error("{field} must be a fraction in (0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: Decimal },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_balance: Decimal,
    /// Fraction of executed notional charged per fill.
    pub commission_rate: Decimal,
    pub slippage_model: SlippageModel,
    pub reference_price: ReferencePrice,
    /// Master seed for stochastic slippage.
    pub random_seed: u64,
    /// Shrink oversized orders to the permitted size instead of rejecting them.
    pub resize_on_violation: bool,

    pub max_position_pct: Option<Decimal>,
    pub max_position_size: Option<Decimal>,
    pub max_exposure_pct: Option<Decimal>,
    pub max_drawdown_pct: Option<Decimal>,
    pub daily_loss_limit_pct: Option<Decimal>,
    pub max_trade_loss_pct: Option<Decimal>,
    pub max_open_positions: Option<usize>,
    pub max_trades_per_day: Option<usize>,

    /// Lot size; approved and filled sizes are rounded down to a multiple of it.
    pub size_increment: Option<Decimal>,
    /// Cap each fill at this fraction of the bar's volume. Unset means all-or-nothing.
    pub max_volume_participation: Option<Decimal>,
    pub on_strategy_error: StrategyErrorPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(10_000),
            commission_rate: Decimal::new(1, 3),
            slippage_model: SlippageModel::None,
            reference_price: ReferencePrice::Close,
            random_seed: 0,
            resize_on_violation: true,
            max_position_pct: None,
            max_position_size: None,
            max_exposure_pct: None,
            max_drawdown_pct: None,
            daily_loss_limit_pct: None,
            max_trade_loss_pct: None,
            max_open_positions: None,
            max_trades_per_day: None,
            size_increment: None,
            max_volume_participation: None,
            on_strategy_error: StrategyErrorPolicy::Halt,
        }
    }
}

fn check_fraction(field: &'static str, value: Option<Decimal>) -> Result<(), ConfigError> {
    match value {
        Some(v) if v <= Decimal::ZERO || v > Decimal::ONE => {
            Err(ConfigError::FractionOutOfRange { field, value: v })
        }
        _ => Ok(()),
    }
}

fn check_positive(field: &'static str, value: Option<Decimal>) -> Result<(), ConfigError> {
    match value {
        Some(v) if v <= Decimal::ZERO => Err(ConfigError::NonPositive { field, value: v }),
        _ => Ok(()),
    }
}

fn check_non_negative(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }
        check_non_negative("commission_rate", self.commission_rate)?;
        match &self.slippage_model {
            SlippageModel::None => {}
            SlippageModel::FixedBps { bps } => check_non_negative("slippage_model.bps", *bps)?,
            SlippageModel::FixedAmount { amount } => {
                check_non_negative("slippage_model.amount", *amount)?
            }
            SlippageModel::RandomBps { max_bps } => {
                check_non_negative("slippage_model.max_bps", *max_bps)?
            }
        }

        check_fraction("max_position_pct", self.max_position_pct)?;
        check_fraction("max_exposure_pct", self.max_exposure_pct)?;
        check_fraction("max_drawdown_pct", self.max_drawdown_pct)?;
        check_fraction("daily_loss_limit_pct", self.daily_loss_limit_pct)?;
        check_fraction("max_trade_loss_pct", self.max_trade_loss_pct)?;
        check_fraction("max_volume_participation", self.max_volume_participation)?;
        check_positive("max_position_size", self.max_position_size)?;
        check_positive("size_increment", self.size_increment)?;

        if self.max_open_positions == Some(0) {
            return Err(ConfigError::ZeroLimit {
                field: "max_open_positions",
            });
        }
        if self.max_trades_per_day == Some(0) {
            return Err(ConfigError::ZeroLimit {
                field: "max_trades_per_day",
            });
        }
        Ok(())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.commission_rate, self.slippage_model.clone())
    }

    /// Content hash of the canonical JSON form; identical configs hash identically.
    pub fn config_hash(&self) -> ContentHash {
        let json = serde_json::to_vec(self).unwrap_or_default();
        ContentHash::from_bytes(&json)
    }
}
