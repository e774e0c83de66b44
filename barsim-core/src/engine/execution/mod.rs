//! Execution simulator: turns risk-approved orders into fills.
//!
//! Per order: size it against the bar's liquidity (when a participation cap is
//! configured), price it through `fill_price`, then hand it to the ledger.
//! The ledger either applies the fill atomically or refuses it; a refusal
//! becomes a `FillRejection` value and nothing changes.

pub mod cost_model;
pub mod fill_price;

pub use cost_model::{CostModel, SlippageModel};
pub use fill_price::{compute_fill, ComputedFill, ReferencePrice};

use crate::config::BacktestConfig;
use crate::domain::order::floor_to_increment;
use crate::domain::{Bar, Fill, LedgerError, Order, PortfolioLedger};
use crate::rng::{RngHierarchy, SLIPPAGE_STREAM};
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Why an accepted order did not produce a fill.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillRejection {
    #[error("limit {limit} not reached")]
    LimitNotReached { limit: Decimal },

    #[error("exit level {level} outside the bar's range")]
    LevelNotReached { level: Decimal },

    #[error("notional of {size} units overflows")]
    Overflow { size: Decimal },

    #[error("no liquidity: bar volume {volume} allows no fill")]
    NoLiquidity { volume: Decimal },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("fill price {price} is not positive")]
    InvalidPrice { price: Decimal },

    #[error("ledger refused fill: {reason}")]
    Refused { reason: String },
}

impl From<LedgerError> for FillRejection {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => FillRejection::InsufficientFunds {
                required,
                available,
            },
            other => FillRejection::Refused {
                reason: other.to_string(),
            },
        }
    }
}

/// The execution simulator.
///
/// Owns one seeded RNG stream per symbol, created lazily from the run's
/// `RngHierarchy`, so stochastic slippage for a symbol depends only on the
/// seed and that symbol's own order history.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    cost_model: CostModel,
    reference: ReferencePrice,
    max_participation: Option<Decimal>,
    size_increment: Option<Decimal>,
    rngs: RngHierarchy,
    streams: BTreeMap<String, StdRng>,
}

impl ExecutionSimulator {
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            cost_model: config.cost_model(),
            reference: config.reference_price,
            max_participation: config.max_volume_participation,
            size_increment: config.size_increment,
            rngs: RngHierarchy::new(config.random_seed),
            streams: BTreeMap::new(),
        }
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Size the order may fill at on this bar, after the participation cap.
    fn fill_size(&self, order: &Order, bar: &Bar) -> Result<Decimal, FillRejection> {
        let Some(participation) = self.max_participation else {
            return Ok(order.size);
        };
        let cap = floor_to_increment(bar.volume * participation, self.size_increment);
        if cap <= Decimal::ZERO {
            return Err(FillRejection::NoLiquidity { volume: bar.volume });
        }
        Ok(order.size.min(cap))
    }

    /// Price the order on `bar` without touching any ledger.
    pub fn simulate(&mut self, order: &Order, bar: &Bar) -> Result<Fill, FillRejection> {
        let size = self.fill_size(order, bar)?;
        let rng = self
            .streams
            .entry(order.symbol.clone())
            .or_insert_with(|| self.rngs.rng_for(SLIPPAGE_STREAM, &order.symbol));

        let computed = compute_fill(order, bar, size, self.reference, &self.cost_model, rng)?;
        if computed.price <= Decimal::ZERO {
            return Err(FillRejection::InvalidPrice {
                price: computed.price,
            });
        }

        Ok(Fill {
            order: order.clone(),
            size,
            reference_price: computed.reference,
            price: computed.price,
            slippage: computed.slippage,
            fee: computed.fee,
            realized_pnl: Decimal::ZERO,
            closed_size: Decimal::ZERO,
            timestamp: bar.timestamp,
            partial: size < order.size,
        })
    }

    /// Price the order and apply it to the ledger atomically.
    pub fn execute(
        &mut self,
        order: &Order,
        bar: &Bar,
        ledger: &mut PortfolioLedger,
    ) -> Result<Fill, FillRejection> {
        let fill = self.simulate(order, bar)?;
        match ledger.apply_fill(fill) {
            Ok(fill) => {
                debug!(
                    signal = %order.signal_id,
                    symbol = %order.symbol,
                    intent = %order.intent,
                    size = %fill.size,
                    price = %fill.price,
                    fee = %fill.fee,
                    realized = %fill.realized_pnl,
                    partial = fill.partial,
                    "fill applied"
                );
                Ok(fill)
            }
            Err(err) => {
                warn!(signal = %order.signal_id, symbol = %order.symbol, error = %err, "fill aborted");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Signal;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(volume: Decimal) -> Bar {
        Bar::new(
            "SPY",
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            dec!(100),
            dec!(102),
            dec!(98),
            dec!(100),
            volume,
        )
    }

    fn ledger() -> PortfolioLedger {
        let mut ledger = PortfolioLedger::new(dec!(10000));
        ledger.mark("SPY", dec!(100));
        ledger
    }

    fn order(signal: Signal) -> Order {
        Order::from_signal(&signal, signal.size)
    }

    #[test]
    fn market_order_fills_whole_size() {
        let mut sim = ExecutionSimulator::new(&BacktestConfig::default());
        let mut ledger = ledger();
        let fill = sim
            .execute(&order(Signal::open_long("SPY", dec!(5))), &bar(dec!(1000)), &mut ledger)
            .unwrap();
        assert_eq!(fill.size, dec!(5));
        assert_eq!(fill.fee, dec!(0.5));
        assert!(!fill.partial);
        assert_eq!(ledger.cash(), dec!(9499.5));
    }

    #[test]
    fn insufficient_funds_is_a_rejection_not_a_mutation() {
        let mut sim = ExecutionSimulator::new(&BacktestConfig::default());
        let mut ledger = ledger();
        let before = ledger.clone();
        let err = sim
            .execute(&order(Signal::open_long("SPY", dec!(100))), &bar(dec!(1000)), &mut ledger)
            .unwrap_err();
        assert!(matches!(err, FillRejection::InsufficientFunds { .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn participation_caps_fill_size() {
        let config = BacktestConfig {
            max_volume_participation: Some(dec!(0.1)),
            size_increment: Some(dec!(1)),
            ..Default::default()
        };
        let mut sim = ExecutionSimulator::new(&config);
        let fill = sim
            .simulate(&order(Signal::open_long("SPY", dec!(20))), &bar(dec!(75)))
            .unwrap();
        assert_eq!(fill.size, dec!(7));
        assert!(fill.partial);
    }

    #[test]
    fn zero_volume_with_participation_is_no_liquidity() {
        let config = BacktestConfig {
            max_volume_participation: Some(dec!(0.5)),
            ..Default::default()
        };
        let mut sim = ExecutionSimulator::new(&config);
        let err = sim
            .simulate(&order(Signal::open_long("SPY", dec!(1))), &bar(Decimal::ZERO))
            .unwrap_err();
        assert!(matches!(err, FillRejection::NoLiquidity { .. }));
    }

    #[test]
    fn unreached_limit_aborts() {
        let mut sim = ExecutionSimulator::new(&BacktestConfig::default());
        let err = sim
            .simulate(
                &order(Signal::open_long("SPY", dec!(1)).with_limit(dec!(90))),
                &bar(dec!(1000)),
            )
            .unwrap_err();
        assert_eq!(err, FillRejection::LimitNotReached { limit: dec!(90) });
    }

    #[test]
    fn seeded_random_slippage_replays() {
        let config = BacktestConfig {
            slippage_model: SlippageModel::RandomBps { max_bps: dec!(25) },
            random_seed: 11,
            ..Default::default()
        };
        let run = || {
            let mut sim = ExecutionSimulator::new(&config);
            (0..10)
                .map(|_| {
                    sim.simulate(&order(Signal::open_long("SPY", dec!(1))), &bar(dec!(1000)))
                        .unwrap()
                        .price
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
