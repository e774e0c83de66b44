//! Bar-by-bar event loop: the heart of the backtesting engine.
//!
//! Per bar, strictly in this order:
//! 1. Pull the next bar from the merged feed (exhaustion ends the run)
//! 2. Roll the risk day and mark the bar's symbol at its close
//! 3. Protective exits, trailing stops ratcheted to the new mark, then every
//!    strategy in registration order
//! 4. Each signal in emission order: risk policy, then execution
//! 5. Verify ledger invariants and record one snapshot
//!
//! Cancellation is checked only between bars, so a cancelled run always
//! leaves the ledger in a fully-applied state.

use crate::audit::{ExecutionResult, FaultAction};
use crate::config::{BacktestConfig, ConfigError, StrategyErrorPolicy};
use crate::data::{BarFeed, DataSource};
use crate::domain::{Bar, Fill, Order, Signal};
use crate::engine::execution::FillRejection;
use crate::fingerprint::RunFingerprint;
use crate::strategy::Strategy;

use super::error::EngineError;
use super::protective::protective_exit;
use super::state::{CancelToken, EngineState, RunResult, Termination};

use rust_decimal::Decimal;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info, warn};

/// A configured backtest: static config plus the strategies to drive.
pub struct Backtest {
    config: BacktestConfig,
    strategies: Vec<Box<dyn Strategy>>,
    cancel: CancelToken,
}

/// A strategy failure on one bar, before the policy decides what to do with it.
struct Fault {
    strategy_id: String,
    message: String,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}

impl Backtest {
    pub fn new(config: BacktestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            strategies: Vec::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[Box<dyn Strategy>] {
        &self.strategies
    }

    /// Run every bar from `source` through the loop.
    pub fn run<D: DataSource + ?Sized>(&mut self, source: &D) -> RunResult {
        let mut feed = BarFeed::new(source.bars());
        let mut state = EngineState::new(&self.config);
        info!(
            bars = feed.remaining(),
            symbols = feed.symbols().count(),
            strategies = self.strategies.len(),
            seed = self.config.random_seed,
            "backtest started"
        );

        let termination = loop {
            if self.cancel.is_cancelled() {
                warn!(bar_index = state.bar_index, "backtest cancelled");
                break Termination::Cancelled;
            }
            let bar = match feed.next() {
                None => break Termination::Exhausted,
                Some(Err(source)) => {
                    error!(bar_index = state.bar_index, error = %source, "bad input data");
                    break Termination::Fatal(EngineError::Data {
                        bar_index: state.bar_index,
                        source,
                    });
                }
                Some(Ok(bar)) => bar,
            };
            match self.step(&mut state, bar) {
                Ok(None) => {}
                Ok(Some(stop)) => break stop,
                Err(err) => {
                    error!(error = %err, "backtest aborted");
                    break Termination::Fatal(err);
                }
            }
        };

        let bars_processed = state.snapshots.len();
        let fingerprint =
            RunFingerprint::compute(&self.config, &state.audit, &state.snapshots, bars_processed);
        info!(
            termination = %termination,
            bars = bars_processed,
            fills = state.ledger.fill_count(),
            equity = %state.ledger.equity(),
            "backtest finished"
        );

        RunResult {
            termination,
            audit: state.audit,
            snapshots: state.snapshots,
            ledger: state.ledger,
            bars_processed,
            fingerprint,
        }
    }

    /// One full bar cycle. `Ok(Some(_))` asks the loop to stop after this bar.
    fn step(&mut self, state: &mut EngineState, bar: Bar) -> Result<Option<Termination>, EngineError> {
        let bar_index = state.bar_index;

        state.risk.begin_bar(bar.timestamp, &state.ledger);
        state.ledger.mark(&bar.symbol, bar.close);
        state.last_bars.insert(bar.symbol.clone(), bar.clone());

        if let Some(mut exit) = protective_exit(&state.ledger, &bar) {
            exit.stamp_protective(state.id_gen.next_signal_id(), bar.timestamp);
            let owner = state.position_owners.get(&bar.symbol).copied();
            self.process_signal(state, owner, exit, bar_index);
        }
        state.ledger.trail_stop(&bar.symbol);

        let (collected, fault) = self.collect_signals(state, &bar);

        let mut halt = None;
        if let Some(fault) = fault {
            let action = FaultAction::from(self.config.on_strategy_error);
            error!(
                strategy = %fault.strategy_id,
                symbol = %bar.symbol,
                bar_index,
                discarded = collected.len(),
                action = ?action,
                "strategy failed: {}",
                fault.message
            );
            state.audit.record_fault(
                bar_index,
                bar.timestamp,
                &fault.strategy_id,
                &bar.symbol,
                fault.message.clone(),
                collected.len(),
                action,
            );
            if self.config.on_strategy_error == StrategyErrorPolicy::Halt {
                halt = Some(Termination::StrategyHalt {
                    strategy_id: fault.strategy_id,
                    bar_index,
                    message: fault.message,
                });
            }
        } else {
            for (owner, mut signal) in collected {
                let strategy_id = self.strategies[owner].id().to_string();
                signal.stamp(state.id_gen.next_signal_id(), &strategy_id, bar.timestamp);
                self.process_signal(state, Some(owner), signal, bar_index);
            }
        }

        state.risk.end_bar(&state.ledger);
        state
            .ledger
            .verify()
            .map_err(|source| EngineError::Ledger {
                bar_index,
                timestamp: bar.timestamp,
                source,
            })?;
        let snapshot = state.ledger.snapshot(bar_index, bar.timestamp);
        state.snapshots.push(snapshot);
        state.bar_index += 1;

        Ok(halt)
    }

    /// Call every strategy in registration order. Stops at the first failure;
    /// whatever was collected up to then is returned for the fault record.
    fn collect_signals(&mut self, state: &EngineState, bar: &Bar) -> (Vec<(usize, Signal)>, Option<Fault>) {
        let mut collected = Vec::new();
        for (owner, strategy) in self.strategies.iter_mut().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.on_bar(bar, &state.ledger)));
            let message = match outcome {
                Ok(Ok(signals)) => {
                    collected.extend(signals.into_iter().map(|s| (owner, s)));
                    continue;
                }
                Ok(Err(err)) => err.message,
                Err(payload) => panic_message(payload.as_ref()),
            };
            let fault = Fault {
                strategy_id: strategy.id().to_string(),
                message,
            };
            return (collected, Some(fault));
        }
        (collected, None)
    }

    /// Keep `position_owners` in step with the ledger after a fill. The
    /// strategy whose opening fill starts (or flips) a position owns it until
    /// the position goes flat.
    fn track_owner(state: &mut EngineState, owner: Option<usize>, fill: &Fill) {
        let symbol = fill.symbol();
        let Some(pos) = state.ledger.position_of(symbol) else {
            state.position_owners.remove(symbol);
            return;
        };
        let Some(owner) = owner else {
            return;
        };
        let intent = fill.order.intent;
        let starts_position = !state.position_owners.contains_key(symbol)
            || fill.closed_size > Decimal::ZERO;
        if intent.is_opening() && intent.position_side() == pos.side && starts_position {
            state.position_owners.insert(symbol.to_string(), owner);
        }
    }

    /// Risk, then execution, then audit for a single signal.
    fn process_signal(
        &mut self,
        state: &mut EngineState,
        owner: Option<usize>,
        signal: Signal,
        bar_index: usize,
    ) {
        let decision = state.risk.evaluate(&signal, &state.ledger);
        let execution = match decision.approved_size(signal.size) {
            None => {
                warn!(
                    signal = %signal.id,
                    strategy = %signal.strategy_id,
                    symbol = %signal.symbol,
                    outcome = ?decision.outcome,
                    "signal rejected"
                );
                ExecutionResult::NotSubmitted
            }
            Some(size) => {
                let order = Order::from_signal(&signal, size);
                let result = match state.last_bars.get(&signal.symbol) {
                    Some(bar) => state.simulator.execute(&order, bar, &mut state.ledger),
                    None => Err(FillRejection::Refused {
                        reason: format!("no bar seen for {}", signal.symbol),
                    }),
                };
                match result {
                    Ok(fill) => {
                        state.risk.record_fill();
                        Self::track_owner(state, owner, &fill);
                        if let Some(owner) = owner {
                            self.strategies[owner].on_fill(&fill);
                        }
                        ExecutionResult::Filled { fill }
                    }
                    Err(reason) => ExecutionResult::Aborted { reason },
                }
            }
        };
        state
            .audit
            .record_signal(bar_index, signal, decision, execution);
    }
}

/// Run a backtest in one call.
pub fn run_backtest<D: DataSource + ?Sized>(
    config: BacktestConfig,
    strategies: Vec<Box<dyn Strategy>>,
    source: &D,
) -> Result<RunResult, ConfigError> {
    let mut backtest = Backtest::new(config)?;
    for strategy in strategies {
        backtest.add_strategy(strategy);
    }
    Ok(backtest.run(source))
}
