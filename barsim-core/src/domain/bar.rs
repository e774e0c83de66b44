//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol at a single timestamp.
///
/// Bars are immutable once loaded. Per symbol they must arrive strictly
/// ordered by timestamp; the feed enforces that contract as it merges series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Why a bar failed the OHLCV sanity check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarError {
    #[error("{symbol} @ {timestamp}: prices must be positive")]
    NonPositivePrice {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
    #[error("{symbol} @ {timestamp}: high {high} is below low {low}")]
    InvertedRange {
        symbol: String,
        timestamp: DateTime<Utc>,
        high: Decimal,
        low: Decimal,
    },
    #[error("{symbol} @ {timestamp}: open/close outside [low, high]")]
    OutsideRange {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
    #[error("{symbol} @ {timestamp}: negative volume {volume}")]
    NegativeVolume {
        symbol: String,
        timestamp: DateTime<Utc>,
        volume: Decimal,
    },
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Basic OHLCV sanity check: low <= open, close <= high, positive prices.
    pub fn validate(&self) -> Result<(), BarError> {
        let symbol = || self.symbol.clone();
        if self.open <= Decimal::ZERO
            || self.high <= Decimal::ZERO
            || self.low <= Decimal::ZERO
            || self.close <= Decimal::ZERO
        {
            return Err(BarError::NonPositivePrice {
                symbol: symbol(),
                timestamp: self.timestamp,
            });
        }
        if self.high < self.low {
            return Err(BarError::InvertedRange {
                symbol: symbol(),
                timestamp: self.timestamp,
                high: self.high,
                low: self.low,
            });
        }
        let in_range = |p: Decimal| p >= self.low && p <= self.high;
        if !in_range(self.open) || !in_range(self.close) {
            return Err(BarError::OutsideRange {
                symbol: symbol(),
                timestamp: self.timestamp,
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(BarError::NegativeVolume {
                symbol: symbol(),
                timestamp: self.timestamp,
                volume: self.volume,
            });
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }

    /// Typical price `(high + low + close) / 3`, used as the VWAP approximation.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}
