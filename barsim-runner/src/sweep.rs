//! Parameter sweeps over risk settings and seeds.
//!
//! Each configuration is an independent run with its own strategies (built by
//! a factory) and its own engine state, so runs can go to rayon workers in
//! any order. Results always come back in input order.

use rayon::prelude::*;
use rust_decimal::Decimal;

use barsim_core::data::DataSource;
use barsim_core::strategy::Strategy;

use crate::config::RunConfig;
use crate::runner::{run_config, BacktestRun, RunError};

/// Grid of risk limits to sweep. An empty axis keeps the base value.
#[derive(Debug, Clone, Default)]
pub struct RiskGrid {
    pub max_position_pct: Vec<Option<Decimal>>,
    pub max_exposure_pct: Vec<Option<Decimal>>,
    pub max_drawdown_pct: Vec<Option<Decimal>>,
    pub seeds: Vec<u64>,
}

fn axis<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

fn label(value: Option<Decimal>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.normalize().to_string())
}

impl RiskGrid {
    /// Number of configurations the grid expands to.
    pub fn size(&self) -> usize {
        [
            self.max_position_pct.len(),
            self.max_exposure_pct.len(),
            self.max_drawdown_pct.len(),
            self.seeds.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Cartesian product of the axes applied to `base`, in a fixed order.
    pub fn generate_configs(&self, base: &RunConfig) -> Vec<RunConfig> {
        let b = &base.backtest;
        let positions = axis(&self.max_position_pct, b.max_position_pct);
        let exposures = axis(&self.max_exposure_pct, b.max_exposure_pct);
        let drawdowns = axis(&self.max_drawdown_pct, b.max_drawdown_pct);
        let seeds: Vec<Option<u64>> = if self.seeds.is_empty() {
            vec![base.seed]
        } else {
            self.seeds.iter().copied().map(Some).collect()
        };

        let mut configs = Vec::with_capacity(self.size());
        for &pos in &positions {
            for &exp in &exposures {
                for &dd in &drawdowns {
                    for &seed in &seeds {
                        let mut config = base.clone();
                        config.backtest.max_position_pct = pos;
                        config.backtest.max_exposure_pct = exp;
                        config.backtest.max_drawdown_pct = dd;
                        config.seed = seed;
                        config.name = format!(
                            "{}/pos={}/exp={}/dd={}/seed={}",
                            base.name,
                            label(pos),
                            label(exp),
                            label(dd),
                            seed.map_or_else(|| "base".to_string(), |s| s.to_string()),
                        );
                        configs.push(config);
                    }
                }
            }
        }
        configs
    }
}

/// Runs a batch of configurations, optionally in parallel.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every config against `source`. `factory` builds fresh strategies
    /// per run. Stops at the first config error.
    pub fn run<D, F>(&self, configs: &[RunConfig], source: &D, factory: F) -> Result<SweepResults, RunError>
    where
        D: DataSource + Sync + ?Sized,
        F: Fn(&RunConfig) -> Vec<Box<dyn Strategy>> + Sync,
    {
        let runs = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_config(config, factory(config), source))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_config(config, factory(config), source))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(SweepResults { runs })
    }
}

/// Expand `grid` over `base` and run it in parallel.
pub fn run_sweep<D, F>(
    grid: &RiskGrid,
    base: &RunConfig,
    source: &D,
    factory: F,
) -> Result<SweepResults, RunError>
where
    D: DataSource + Sync + ?Sized,
    F: Fn(&RunConfig) -> Vec<Box<dyn Strategy>> + Sync,
{
    ParamSweep::new().run(&grid.generate_configs(base), source, factory)
}

/// Sweep output in input order.
#[derive(Debug, Clone)]
pub struct SweepResults {
    runs: Vec<BacktestRun>,
}

impl SweepResults {
    pub fn all(&self) -> &[BacktestRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BacktestRun> {
        self.runs.iter().find(|r| r.report.name == name)
    }

    /// Completed runs ordered by Sharpe, best first. Ties keep input order.
    pub fn sorted_by_sharpe(&self) -> Vec<&BacktestRun> {
        let mut sorted: Vec<&BacktestRun> = self.runs.iter().filter(|r| r.report.completed).collect();
        sorted.sort_by(|a, b| b.report.metrics.sharpe.total_cmp(&a.report.metrics.sharpe));
        sorted
    }

    pub fn best(&self) -> Option<&BacktestRun> {
        self.sorted_by_sharpe().into_iter().next()
    }

    pub fn into_runs(self) -> Vec<BacktestRun> {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn grid_expands_in_fixed_order() {
        let grid = RiskGrid {
            max_position_pct: vec![Some(dec!(0.05)), Some(dec!(0.10))],
            seeds: vec![1, 2, 3],
            ..Default::default()
        };
        assert_eq!(grid.size(), 6);
        let configs = grid.generate_configs(&RunConfig::default());
        assert_eq!(configs.len(), 6);
        assert_eq!(configs[0].name, "backtest/pos=0.05/exp=none/dd=none/seed=1");
        assert_eq!(configs[5].name, "backtest/pos=0.1/exp=none/dd=none/seed=3");
        assert_eq!(configs[4].seed, Some(2));
    }

    #[test]
    fn empty_grid_is_the_base_config() {
        let base = RunConfig::default();
        let configs = RiskGrid::default().generate_configs(&base);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].backtest, base.backtest);
    }
}
