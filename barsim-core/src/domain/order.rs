//! Order: an accepted signal after risk resizing.

use super::ids::SignalId;
use super::signal::{ExitTrigger, Intent, Signal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// An order ready for the execution simulator.
///
/// Carries the signal's price levels through unchanged; `size` is the size
/// approved by the risk policy, which may be smaller than what was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub signal_id: SignalId,
    pub symbol: String,
    pub intent: Intent,
    pub side: OrderSide,
    pub size: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[serde(default)]
    pub trailing_stop_pct: Option<Decimal>,
    pub trigger: Option<ExitTrigger>,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn from_signal(signal: &Signal, size: Decimal) -> Self {
        Self {
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            intent: signal.intent,
            side: signal.intent.side(),
            size,
            limit_price: signal.limit_price,
            stop_price: signal.stop_price,
            take_profit: signal.take_profit,
            trailing_stop_pct: signal.trailing_stop_pct,
            trigger: signal.trigger,
            timestamp: signal.timestamp,
        }
    }

    pub fn is_limit(&self) -> bool {
        self.limit_price.is_some()
    }
}

/// Round `size` down to a multiple of `increment`; unchanged when no increment is set.
pub fn floor_to_increment(size: Decimal, increment: Option<Decimal>) -> Decimal {
    match increment {
        Some(step) if step > Decimal::ZERO => (size / step).floor() * step,
        _ => size,
    }
}
