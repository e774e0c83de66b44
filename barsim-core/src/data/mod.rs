//! Bar supply: the `DataSource` capability and the merged multi-symbol feed.

pub mod feed;

pub use feed::BarFeed;

use crate::domain::{Bar, BarError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Supplies pre-loaded bars, ordered and deduplicated per symbol.
///
/// Bars for different symbols may be interleaved in any way; the feed merges
/// them by timestamp. The per-symbol ordering contract is checked as each bar
/// is pulled, and a violation ends the run.
pub trait DataSource {
    fn bars(&self) -> Vec<Bar>;
}

impl DataSource for Vec<Bar> {
    fn bars(&self) -> Vec<Bar> {
        self.clone()
    }
}

impl DataSource for [Bar] {
    fn bars(&self) -> Vec<Bar> {
        self.to_vec()
    }
}

/// A broken data contract. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("{symbol}: bar at {timestamp} arrived after {previous}")]
    OutOfOrder {
        symbol: String,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol}: duplicate bar at {timestamp}")]
    Duplicate {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("malformed bar: {0}")]
    Malformed(#[from] BarError),
}
