//! Audit trail: append-only record of every signal's path through the engine.
//!
//! One record per signal (signal → risk decision → execution result) and one
//! per strategy fault. Records are numbered in the order the loop writes them,
//! which is (timestamp, strategy registration order, emission order).

use crate::config::StrategyErrorPolicy;
use crate::domain::ids::ContentHash;
use crate::domain::{Fill, Signal};
use crate::engine::execution::FillRejection;
use crate::risk::RiskDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened after the risk decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Filled { fill: Fill },
    Aborted { reason: FillRejection },
    /// Rejected by risk; never reached the simulator.
    NotSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultAction {
    Halted,
    Skipped,
}

impl From<StrategyErrorPolicy> for FaultAction {
    fn from(policy: StrategyErrorPolicy) -> Self {
        match policy {
            StrategyErrorPolicy::Halt => FaultAction::Halted,
            StrategyErrorPolicy::SkipBar => FaultAction::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    Signal {
        signal: Signal,
        decision: RiskDecision,
        execution: ExecutionResult,
    },
    StrategyFault {
        strategy_id: String,
        symbol: String,
        message: String,
        /// Signals collected on the faulted bar that were not executed.
        discarded_signals: usize,
        action: FaultAction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, bar_index: usize, timestamp: DateTime<Utc>, event: AuditEvent) {
        let seq = self.records.len() as u64;
        self.records.push(AuditRecord {
            seq,
            bar_index,
            timestamp,
            event,
        });
    }

    pub fn record_signal(
        &mut self,
        bar_index: usize,
        signal: Signal,
        decision: RiskDecision,
        execution: ExecutionResult,
    ) {
        let timestamp = signal.timestamp;
        self.push(
            bar_index,
            timestamp,
            AuditEvent::Signal {
                signal,
                decision,
                execution,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_fault(
        &mut self,
        bar_index: usize,
        timestamp: DateTime<Utc>,
        strategy_id: &str,
        symbol: &str,
        message: String,
        discarded_signals: usize,
        action: FaultAction,
    ) {
        self.push(
            bar_index,
            timestamp,
            AuditEvent::StrategyFault {
                strategy_id: strategy_id.to_string(),
                symbol: symbol.to_string(),
                message,
                discarded_signals,
                action,
            },
        );
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.records.iter().filter_map(|r| match &r.event {
            AuditEvent::Signal {
                execution: ExecutionResult::Filled { fill },
                ..
            } => Some(fill),
            _ => None,
        })
    }

    pub fn rejected_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(&r.event, AuditEvent::Signal { decision, .. } if decision.is_rejected()))
            .count()
    }

    pub fn aborted_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| {
                matches!(
                    &r.event,
                    AuditEvent::Signal {
                        execution: ExecutionResult::Aborted { .. },
                        ..
                    }
                )
            })
            .count()
    }

    pub fn fault_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.event, AuditEvent::StrategyFault { .. }))
            .count()
    }

    /// BLAKE3 over the canonical JSON of the whole stream.
    pub fn digest(&self) -> ContentHash {
        let json = serde_json::to_vec(&self.records).unwrap_or_default();
        ContentHash::from_bytes(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalId;
    use crate::risk::RejectReason;
    use rust_decimal_macros::dec;

    fn rejected(id: u64) -> (Signal, RiskDecision) {
        let mut signal = Signal::open_long("BTC", dec!(1));
        signal.id = SignalId(id);
        let decision = RiskDecision::reject(signal.id, RejectReason::NoMarketPrice);
        (signal, decision)
    }

    #[test]
    fn sequence_numbers_are_dense() {
        let mut trail = AuditTrail::new();
        for i in 0..3 {
            let (s, d) = rejected(i);
            trail.record_signal(0, s, d, ExecutionResult::NotSubmitted);
        }
        let seqs: Vec<u64> = trail.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(trail.rejected_count(), 3);
        assert_eq!(trail.fills().count(), 0);
    }

    #[test]
    fn faults_are_counted_separately() {
        let mut trail = AuditTrail::new();
        trail.record_fault(
            4,
            DateTime::<Utc>::default(),
            "ma-cross",
            "BTC",
            "boom".into(),
            2,
            FaultAction::Skipped,
        );
        assert_eq!(trail.fault_count(), 1);
        assert_eq!(trail.rejected_count(), 0);
    }

    #[test]
    fn digest_changes_with_content() {
        let mut a = AuditTrail::new();
        let mut b = AuditTrail::new();
        let (s, d) = rejected(0);
        a.record_signal(0, s.clone(), d.clone(), ExecutionResult::NotSubmitted);
        b.record_signal(0, s, d, ExecutionResult::NotSubmitted);
        assert_eq!(a.digest(), b.digest());

        let (s, d) = rejected(1);
        b.record_signal(1, s, d, ExecutionResult::NotSubmitted);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn record_serializes_as_json_line() {
        let mut trail = AuditTrail::new();
        let (s, d) = rejected(0);
        trail.record_signal(0, s, d, ExecutionResult::NotSubmitted);
        let line = serde_json::to_string(&trail.records()[0]).unwrap();
        assert!(line.contains("\"type\":\"signal\""));
        assert!(line.contains("\"status\":\"not_submitted\""));
    }
}
