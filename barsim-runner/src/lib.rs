//! BarSim Runner: backtest orchestration around `barsim-core`.
//!
//! This crate builds on the engine to provide:
//! - TOML run configuration with seed overrides
//! - Logging initialisation (pretty / json / compact)
//! - Performance metrics over snapshots and the audit trail
//! - Parallel parameter sweeps with order-preserving results
//! - Artifact export (CSV snapshots, JSONL audit, JSON report)

pub mod config;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, RunConfig};
pub use export::{export_audit_jsonl, export_snapshots_csv, save_artifacts};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::PerformanceMetrics;
pub use runner::{run_config, BacktestReport, BacktestRun, RunError};
pub use sweep::{run_sweep, ParamSweep, RiskGrid, SweepResults};
