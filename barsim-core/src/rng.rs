//! Deterministic RNG hierarchy.
//!
//! A master seed (`BacktestConfig::random_seed`) generates deterministic
//! sub-seeds for each `(stream, symbol)` pair. Sub-seeds are derived via BLAKE3
//! hashing, so a symbol's draws never depend on how many other symbols were
//! seen first or on which thread a sweep ran the backtest.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream label used by the execution simulator for stochastic slippage.
pub const SLIPPAGE_STREAM: &str = "slippage";

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a `(stream, symbol)` pair.
    pub fn sub_seed(&self, stream: &str, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") differ.
        hasher.update(&[0u8]);
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, stream: &str, symbol: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, symbol))
    }
}
