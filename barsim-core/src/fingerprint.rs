//! Run fingerprinting: deterministic identification of a backtest's outputs.
//!
//! - `config_hash`: exact identity of the static configuration.
//! - `audit_digest`: the ordered audit stream.
//! - `snapshot_digest`: the per-bar ledger snapshot series.
//!
//! Two runs with the same bars, strategies, config and seed must produce equal
//! fingerprints, whether run serially or inside a parallel sweep.

use crate::audit::AuditTrail;
use crate::config::BacktestConfig;
use crate::domain::ids::ContentHash;
use crate::engine::accounting::LedgerSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub config_hash: ContentHash,
    pub audit_digest: ContentHash,
    pub snapshot_digest: ContentHash,
    pub bars_processed: usize,
}

impl RunFingerprint {
    pub fn compute(
        config: &BacktestConfig,
        audit: &AuditTrail,
        snapshots: &[LedgerSnapshot],
        bars_processed: usize,
    ) -> Self {
        // serde_json over Vec/struct fields is order-stable, so the bytes are canonical.
        let snapshot_json = serde_json::to_vec(snapshots).unwrap_or_default();
        Self {
            config_hash: config.config_hash(),
            audit_digest: audit.digest(),
            snapshot_digest: ContentHash::from_bytes(&snapshot_json),
            bars_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_runs_fingerprint_identically() {
        let config = BacktestConfig::default();
        let a = RunFingerprint::compute(&config, &AuditTrail::new(), &[], 0);
        let b = RunFingerprint::compute(&config, &AuditTrail::new(), &[], 0);
        assert_eq!(a, b);
    }

    #[test]
    fn config_change_changes_fingerprint() {
        let a = RunFingerprint::compute(&BacktestConfig::default(), &AuditTrail::new(), &[], 0);
        let other = BacktestConfig {
            random_seed: 99,
            ..Default::default()
        };
        let b = RunFingerprint::compute(&other, &AuditTrail::new(), &[], 0);
        assert_ne!(a.config_hash, b.config_hash);
        assert_eq!(a.audit_digest, b.audit_digest);
    }
}
