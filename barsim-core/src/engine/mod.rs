//! Backtesting engine: bar-by-bar event loop and supporting infrastructure.
//!
//! The engine consumes a merged, time-ordered bar feed and drives registered
//! strategies through the per-bar cycle:
//!
//! 1. Mark the bar's symbol and roll the risk day
//! 2. Fire protective exits (stop-loss / take-profit) for open positions
//! 3. Collect strategy signals, gate them through the risk policy
//! 4. Execute approved orders against the ledger
//! 5. Verify ledger invariants and record a snapshot

pub mod accounting;
pub mod error;
pub mod execution;
pub mod loop_runner;
pub mod portfolio_update;
pub mod protective;
pub mod state;

pub use accounting::{equity_curve, max_drawdown, LedgerSnapshot};
pub use error::EngineError;
pub use execution::{
    CostModel, ExecutionSimulator, FillRejection, ReferencePrice, SlippageModel,
};
pub use loop_runner::{run_backtest, Backtest};
pub use portfolio_update::{plan_fill, FillPlan, Transition};
pub use protective::{protective_exit, PROTECTIVE_EXIT_ID};
pub use state::{CancelToken, EngineState, RunResult, Termination};
