//! Run configuration loaded from TOML.
//!
//! A run file wraps the engine's `BacktestConfig` with run metadata:
//!
//! ```toml
//! name = "spy-momentum"
//! seed = 7
//!
//! [backtest]
//! initial_balance = "25000"
//! commission_rate = "0.0005"
//! max_position_pct = "0.1"
//!
//! [backtest.slippage_model]
//! type = "fixed_bps"
//! bps = "5"
//! ```
//!
//! Missing engine fields take their defaults; the merged config is validated
//! before it is handed out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use barsim_core::config::BacktestConfig;
use barsim_core::domain::ContentHash;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid backtest config: {0}")]
    Invalid(#[from] barsim_core::config::ConfigError),
}

fn default_name() -> String {
    "backtest".to_string()
}

/// One named run: engine config plus an optional seed override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Replaces `backtest.random_seed` when set.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            seed: None,
            backtest: BacktestConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(name: impl Into<String>, backtest: BacktestConfig) -> Self {
        Self {
            name: name.into(),
            seed: None,
            backtest,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.effective()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The engine config with the seed override applied, validated.
    pub fn effective(&self) -> Result<BacktestConfig, ConfigError> {
        let mut config = self.backtest.clone();
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        config.validate()?;
        Ok(config)
    }

    /// Content hash of the effective engine config. Two runs with the same
    /// id replay identically given the same bars and strategies.
    pub fn run_id(&self) -> Result<ContentHash, ConfigError> {
        Ok(self.effective()?.config_hash())
    }
}
