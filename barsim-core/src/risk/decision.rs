//! Risk decisions: the value every evaluated signal produces.

use crate::domain::SignalId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a signal was rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    InvalidSize { size: Decimal },
    NoMarketPrice,
    NoPositionToClose,
    EquityDepleted { equity: Decimal },
    PositionLimit { allowed: Decimal },
    ExposureLimit { allowed: Decimal },
    DrawdownBreach { drawdown: Decimal, limit: Decimal },
    DailyLossHalt,
    TradeLossCap { implied_loss: Decimal, cap: Decimal },
    MaxOpenPositions { limit: usize },
    MaxTradesPerDay { limit: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidSize { size } => write!(f, "invalid size {size}"),
            RejectReason::NoMarketPrice => write!(f, "no market price"),
            RejectReason::NoPositionToClose => write!(f, "no matching position to close"),
            RejectReason::EquityDepleted { equity } => write!(f, "equity depleted ({equity})"),
            RejectReason::PositionLimit { allowed } => {
                write!(f, "position limit (allowed {allowed})")
            }
            RejectReason::ExposureLimit { allowed } => {
                write!(f, "exposure limit (allowed {allowed})")
            }
            RejectReason::DrawdownBreach { drawdown, limit } => {
                write!(f, "drawdown {drawdown} reached limit {limit}")
            }
            RejectReason::DailyLossHalt => write!(f, "daily loss limit halt"),
            RejectReason::TradeLossCap { implied_loss, cap } => {
                write!(f, "stop-implied loss {implied_loss} exceeds cap {cap}")
            }
            RejectReason::MaxOpenPositions { limit } => {
                write!(f, "max open positions ({limit}) reached")
            }
            RejectReason::MaxTradesPerDay { limit } => {
                write!(f, "max trades per day ({limit}) reached")
            }
        }
    }
}

/// Why a signal's size was reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeReason {
    /// Close larger than the held position.
    ClampedToPosition,
    PositionLimit,
    ExposureLimit,
    TradeLossCap,
}

impl fmt::Display for ResizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeReason::ClampedToPosition => write!(f, "ClampedToPosition"),
            ResizeReason::PositionLimit => write!(f, "PositionLimit"),
            ResizeReason::ExposureLimit => write!(f, "ExposureLimit"),
            ResizeReason::TradeLossCap => write!(f, "TradeLossCap"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RiskOutcome {
    Accept,
    Reject(RejectReason),
    /// `approved < requested` always; `reason` names the last check that shrank it.
    Resize {
        requested: Decimal,
        approved: Decimal,
        reason: ResizeReason,
    },
}

/// The risk policy's verdict on one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub signal_id: SignalId,
    pub outcome: RiskOutcome,
}

impl RiskDecision {
    pub fn accept(signal_id: SignalId) -> Self {
        Self {
            signal_id,
            outcome: RiskOutcome::Accept,
        }
    }

    pub fn reject(signal_id: SignalId, reason: RejectReason) -> Self {
        Self {
            signal_id,
            outcome: RiskOutcome::Reject(reason),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, RiskOutcome::Reject(_))
    }

    /// Size to submit for execution, or `None` if rejected.
    pub fn approved_size(&self, requested: Decimal) -> Option<Decimal> {
        match &self.outcome {
            RiskOutcome::Accept => Some(requested),
            RiskOutcome::Reject(_) => None,
            RiskOutcome::Resize { approved, .. } => Some(*approved),
        }
    }
}
