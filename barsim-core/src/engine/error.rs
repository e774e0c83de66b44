use crate::data::DataError;
use crate::domain::LedgerError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Conditions that end a run early. Business rejections never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("data error at bar {bar_index}: {source}")]
    Data {
        bar_index: usize,
        #[source]
        source: DataError,
    },

    #[error("ledger invariant broken at bar {bar_index} ({timestamp}): {source}")]
    Ledger {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        #[source]
        source: LedgerError,
    },
}
