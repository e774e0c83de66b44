//! Signal: a strategy's trading intent, before risk evaluation.

use super::ids::SignalId;
use super::order::OrderSide;
use super::position::PositionSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of things a strategy can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
    IncreaseLong,
    IncreaseShort,
}

impl Intent {
    pub fn is_closing(self) -> bool {
        matches!(self, Intent::CloseLong | Intent::CloseShort)
    }

    pub fn is_opening(self) -> bool {
        !self.is_closing()
    }

    /// Buy for open-long, increase-long and close-short; sell otherwise.
    pub fn side(self) -> OrderSide {
        match self {
            Intent::OpenLong | Intent::IncreaseLong | Intent::CloseShort => OrderSide::Buy,
            Intent::OpenShort | Intent::IncreaseShort | Intent::CloseLong => OrderSide::Sell,
        }
    }

    /// The position side this intent opens, grows or closes.
    pub fn position_side(self) -> PositionSide {
        match self {
            Intent::OpenLong | Intent::IncreaseLong | Intent::CloseLong => PositionSide::Long,
            Intent::OpenShort | Intent::IncreaseShort | Intent::CloseShort => PositionSide::Short,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::OpenLong => "open_long",
            Intent::CloseLong => "close_long",
            Intent::OpenShort => "open_short",
            Intent::CloseShort => "close_short",
            Intent::IncreaseLong => "increase_long",
            Intent::IncreaseShort => "increase_short",
        };
        f.write_str(s)
    }
}

/// Marker for closes the engine issues on behalf of a position's protective levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTrigger {
    StopLoss,
    TrailingStop,
    TakeProfit,
}

/// A trading intent emitted by a strategy.
///
/// Strategies fill in symbol, intent, size and the optional price levels.
/// The event loop stamps `id`, `strategy_id` and `timestamp` on collection,
/// so whatever a strategy writes there is overwritten.
///
/// `stop_price`, `take_profit` and `trailing_stop_pct` on an opening signal
/// are protective levels carried onto the resulting position; `limit_price`
/// turns the order into a limit order. `trigger` is engine-owned: stamping a
/// strategy signal clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub symbol: String,
    pub intent: Intent,
    pub size: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Trailing stop distance as a fraction of the best mark since entry.
    #[serde(default)]
    pub trailing_stop_pct: Option<Decimal>,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: Option<ExitTrigger>,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, intent: Intent, size: Decimal) -> Self {
        Self {
            id: SignalId::default(),
            symbol: symbol.into(),
            intent,
            size,
            limit_price: None,
            stop_price: None,
            take_profit: None,
            trailing_stop_pct: None,
            strategy_id: String::new(),
            timestamp: DateTime::<Utc>::default(),
            trigger: None,
        }
    }

    pub fn open_long(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::OpenLong, size)
    }

    pub fn close_long(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::CloseLong, size)
    }

    pub fn open_short(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::OpenShort, size)
    }

    pub fn close_short(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::CloseShort, size)
    }

    pub fn increase_long(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::IncreaseLong, size)
    }

    pub fn increase_short(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, Intent::IncreaseShort, size)
    }

    pub fn with_limit(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn with_stop(mut self, price: Decimal) -> Self {
        self.stop_price = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn with_trailing_stop(mut self, pct: Decimal) -> Self {
        self.trailing_stop_pct = Some(pct);
        self
    }

    pub(crate) fn with_trigger(mut self, trigger: ExitTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Assign the loop-owned identity fields to a strategy signal. Any exit
    /// trigger the strategy set is dropped, so it prices like a plain order.
    pub(crate) fn stamp(&mut self, id: SignalId, strategy_id: &str, timestamp: DateTime<Utc>) {
        self.id = id;
        self.strategy_id = strategy_id.to_string();
        self.timestamp = timestamp;
        self.trigger = None;
    }

    /// Like [`stamp`](Self::stamp), but keeps the trigger of an engine-issued exit.
    pub(crate) fn stamp_protective(&mut self, id: SignalId, timestamp: DateTime<Utc>) {
        let trigger = self.trigger;
        self.stamp(id, crate::engine::PROTECTIVE_EXIT_ID, timestamp);
        self.trigger = trigger;
    }
}
