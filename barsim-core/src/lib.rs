//! BarSim Core: deterministic, risk-gated backtesting engine.
//!
//! This crate contains the whole simulation path:
//! - Domain types (bars, signals, orders, fills, positions, the portfolio ledger)
//! - Time-ordered multi-symbol bar feed
//! - Risk policy with accept / reject / resize decisions
//! - Execution simulator with slippage, commission and liquidity caps
//! - Bar-by-bar event loop with protective exits and an append-only audit trail
//! - Run fingerprinting for reproducibility checks

pub mod audit;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod risk;
pub mod rng;
pub mod strategy;

pub use audit::{AuditEvent, AuditRecord, AuditTrail, ExecutionResult, FaultAction};
pub use config::{BacktestConfig, ConfigError, StrategyErrorPolicy};
pub use data::{BarFeed, DataError, DataSource};
pub use domain::{Bar, Fill, Intent, Order, PortfolioLedger, Position, PositionSide, Signal};
pub use engine::{run_backtest, Backtest, CancelToken, EngineError, LedgerSnapshot, RunResult, Termination};
pub use fingerprint::RunFingerprint;
pub use risk::{RiskDecision, RiskOutcome, RiskPolicy};
pub use strategy::{ScriptedStrategy, Strategy, StrategyError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a sweep moves across threads is Send,
    /// and result types are also Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::PortfolioLedger>();
        require_sync::<domain::PortfolioLedger>();

        require_send::<config::BacktestConfig>();
        require_sync::<config::BacktestConfig>();
        require_send::<audit::AuditTrail>();
        require_sync::<audit::AuditTrail>();

        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<engine::CancelToken>();
        require_sync::<engine::CancelToken>();
        require_send::<engine::Backtest>();

        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
    }
}
