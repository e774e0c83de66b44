//! Protective exits: engine-issued closes for positions whose stop-loss,
//! trailing stop or take-profit level was touched by the bar.

use crate::domain::{Bar, ExitTrigger, PortfolioLedger, PositionSide, Signal};

/// Strategy id stamped on engine-issued exits.
pub const PROTECTIVE_EXIT_ID: &str = "protective-exit";

/// Close signal for the bar's symbol if its position's stop or target was hit.
///
/// The stop watched is the tighter of the fixed stop and the trailing level
/// reached on earlier bars. When a stop and the target both fall inside the
/// bar's range the stop wins: without intrabar data the adverse path is assumed.
pub fn protective_exit(ledger: &PortfolioLedger, bar: &Bar) -> Option<Signal> {
    let pos = ledger.position_of(&bar.symbol)?;
    let stop = pos.effective_stop();

    let (stop_hit, target_hit) = match pos.side {
        PositionSide::Long => (
            stop.is_some_and(|(s, _)| bar.low <= s),
            pos.take_profit.is_some_and(|t| bar.high >= t),
        ),
        PositionSide::Short => (
            stop.is_some_and(|(s, _)| bar.high >= s),
            pos.take_profit.is_some_and(|t| bar.low <= t),
        ),
    };

    let close = match pos.side {
        PositionSide::Long => Signal::close_long(&bar.symbol, pos.size),
        PositionSide::Short => Signal::close_short(&bar.symbol, pos.size),
    };

    if stop_hit {
        let (level, trailing) = stop?;
        let trigger = if trailing {
            ExitTrigger::TrailingStop
        } else {
            ExitTrigger::StopLoss
        };
        Some(close.with_stop(level).with_trigger(trigger))
    } else if target_hit {
        let target = pos.take_profit?;
        Some(close.with_take_profit(target).with_trigger(ExitTrigger::TakeProfit))
    } else {
        None
    }
}
