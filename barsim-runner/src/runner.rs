//! Single-run entry point: wires a `RunConfig`, strategies and a data
//! source through the engine, then summarises the outcome.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use barsim_core::data::DataSource;
use barsim_core::domain::ContentHash;
use barsim_core::engine::{Backtest, CancelToken, RunResult};
use barsim_core::fingerprint::RunFingerprint;
use barsim_core::strategy::Strategy;

use crate::config::{ConfigError, RunConfig};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("run '{0}' has no strategies")]
    NoStrategies(String),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Serializable summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub run_id: ContentHash,
    /// Human-readable termination, e.g. `"exhausted"`.
    pub termination: String,
    /// True only when every bar was consumed.
    pub completed: bool,
    pub bars_processed: usize,
    pub initial_balance: Decimal,
    pub final_equity: Decimal,
    pub metrics: PerformanceMetrics,
    pub fingerprint: RunFingerprint,
}

/// A finished run: the report plus the full engine output.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub report: BacktestReport,
    pub result: RunResult,
}

/// Run `config` with `strategies` over `source`.
pub fn run_config<D: DataSource + ?Sized>(
    config: &RunConfig,
    strategies: Vec<Box<dyn Strategy>>,
    source: &D,
) -> Result<BacktestRun, RunError> {
    run_config_with_cancel(config, strategies, source, CancelToken::new())
}

pub fn run_config_with_cancel<D: DataSource + ?Sized>(
    config: &RunConfig,
    strategies: Vec<Box<dyn Strategy>>,
    source: &D,
    cancel: CancelToken,
) -> Result<BacktestRun, RunError> {
    if strategies.is_empty() {
        return Err(RunError::NoStrategies(config.name.clone()));
    }
    let engine_config = config.effective()?;
    let initial_balance = engine_config.initial_balance;

    let mut backtest = Backtest::new(engine_config)
        .map_err(ConfigError::from)?
        .with_cancel_token(cancel);
    for strategy in strategies {
        backtest.add_strategy(strategy);
    }
    let result = backtest.run(source);

    let metrics = PerformanceMetrics::compute(&result.snapshots, &result.audit, initial_balance);
    let report = BacktestReport {
        schema_version: SCHEMA_VERSION,
        name: config.name.clone(),
        run_id: result.fingerprint.config_hash.clone(),
        termination: result.termination.to_string(),
        completed: result.termination.is_complete(),
        bars_processed: result.bars_processed,
        initial_balance,
        final_equity: result.final_equity(),
        metrics,
        fingerprint: result.fingerprint.clone(),
    };
    info!(
        run = %report.name,
        termination = %report.termination,
        total_return = report.metrics.total_return,
        trades = report.metrics.trade_count,
        "run complete"
    );

    Ok(BacktestRun { report, result })
}
