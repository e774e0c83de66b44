//! Mutable run state, cancellation, and run result types.

use crate::audit::AuditTrail;
use crate::config::BacktestConfig;
use crate::domain::ids::IdGen;
use crate::domain::{Bar, PortfolioLedger};
use crate::engine::accounting::LedgerSnapshot;
use crate::engine::error::EngineError;
use crate::engine::execution::ExecutionSimulator;
use crate::fingerprint::RunFingerprint;
use crate::risk::RiskPolicy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable state that evolves bar-by-bar during the engine loop.
///
/// Owned exclusively by one run. The ledger is only written by the simulator
/// (fills) and the loop (marks).
pub struct EngineState {
    pub ledger: PortfolioLedger,
    pub risk: RiskPolicy,
    pub simulator: ExecutionSimulator,
    pub audit: AuditTrail,
    pub snapshots: Vec<LedgerSnapshot>,
    pub id_gen: IdGen,
    pub bar_index: usize,
    /// Latest bar per symbol; signals for a symbol other than the current
    /// bar's execute against that symbol's last bar.
    pub last_bars: BTreeMap<String, Bar>,
    /// Strategy (by registration index) whose fill opened each open position.
    /// Protective exits report their fills back to that strategy.
    pub position_owners: BTreeMap<String, usize>,
}

impl EngineState {
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            ledger: PortfolioLedger::new(config.initial_balance),
            risk: RiskPolicy::new(config),
            simulator: ExecutionSimulator::new(config),
            audit: AuditTrail::new(),
            snapshots: Vec::new(),
            id_gen: IdGen::default(),
            bar_index: 0,
            last_bars: BTreeMap::new(),
            position_owners: BTreeMap::new(),
        }
    }
}

/// Shared flag for stopping a run between bars.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// All bars consumed.
    Exhausted,
    Cancelled,
    StrategyHalt {
        strategy_id: String,
        bar_index: usize,
        message: String,
    },
    Fatal(EngineError),
}

impl Termination {
    pub fn is_complete(&self) -> bool {
        matches!(self, Termination::Exhausted)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exhausted => write!(f, "exhausted"),
            Termination::Cancelled => write!(f, "cancelled"),
            Termination::StrategyHalt {
                strategy_id,
                bar_index,
                message,
            } => write!(f, "halted by {strategy_id} at bar {bar_index}: {message}"),
            Termination::Fatal(err) => write!(f, "fatal: {err}"),
        }
    }
}

/// Result of a backtest run. Produced for every termination, including
/// early ones: audit and snapshots cover every bar fully applied before the stop.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub termination: Termination,
    pub audit: AuditTrail,
    pub snapshots: Vec<LedgerSnapshot>,
    pub ledger: PortfolioLedger,
    pub bars_processed: usize,
    pub fingerprint: RunFingerprint,
}

impl RunResult {
    pub fn final_equity(&self) -> rust_decimal::Decimal {
        self.ledger.equity()
    }
}
