//! Strategy capability: the pluggable source of trading intents.
//!
//! Strategies see each bar and a read-only ledger; they answer with zero or
//! more signals. They never touch the ledger and never see other strategies'
//! signals. Concrete trading logic lives outside this crate.

use crate::domain::{Bar, Fill, PortfolioLedger, Signal};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// A strategy's failure on one bar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StrategyError {
    pub message: String,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trait for strategies driven by the event loop.
///
/// `Send` so a strategy instance can move into a sweep worker; each run owns
/// its own instance.
pub trait Strategy: Send {
    /// Stable identifier recorded on every signal this strategy emits.
    fn id(&self) -> &str;

    /// Evaluate one bar. Signals are executed in the order returned.
    fn on_bar(&mut self, bar: &Bar, ledger: &PortfolioLedger) -> Result<Vec<Signal>, StrategyError>;

    /// Called after each of this strategy's signals fills.
    fn on_fill(&mut self, _fill: &Fill) {}
}

/// Replays a fixed script of signals keyed by `(timestamp, symbol)`.
///
/// Useful for reproducing a recorded signal stream against different risk or
/// cost settings.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    id: String,
    script: BTreeMap<(DateTime<Utc>, String), Vec<Signal>>,
    fills: Vec<Fill>,
}

impl ScriptedStrategy {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Emit `signal` on the bar of its symbol at `timestamp`.
    pub fn at(mut self, timestamp: DateTime<Utc>, signal: Signal) -> Self {
        self.script
            .entry((timestamp, signal.symbol.clone()))
            .or_default()
            .push(signal);
        self
    }

    /// Fills received so far.
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

impl Strategy for ScriptedStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_bar(&mut self, bar: &Bar, _ledger: &PortfolioLedger) -> Result<Vec<Signal>, StrategyError> {
        Ok(self
            .script
            .get(&(bar.timestamp, bar.symbol.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.fills.push(fill.clone());
    }
}
