//! Portfolio update: position arithmetic for a single fill.
//!
//! Pure functions: given the current position (if any) and an incoming fill,
//! work out the realized PnL, how much of the existing position was closed,
//! and what the position looks like afterwards. The ledger applies the plan
//! atomically together with the cash movement.

use crate::domain::order::OrderSide;
use crate::domain::position::{Position, PositionSide};
use rust_decimal::Decimal;

/// How a fill moved the per-symbol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Flat → Long|Short.
    Opened,
    /// Same-side add.
    Increased,
    /// Opposite-side fill smaller than the position.
    Reduced,
    /// Opposite-side fill equal to the position → Flat.
    Closed,
    /// Opposite-side fill larger than the position: implicit close, then open.
    Flipped,
}

/// Resulting position after a fill, before it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resulting {
    pub side: PositionSide,
    pub size: Decimal,
    pub avg_entry_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPlan {
    pub transition: Transition,
    pub realized_pnl: Decimal,
    pub closed_size: Decimal,
    /// `None` when the fill leaves the symbol flat.
    pub resulting: Option<Resulting>,
}

fn side_for(order_side: OrderSide) -> PositionSide {
    match order_side {
        OrderSide::Buy => PositionSide::Long,
        OrderSide::Sell => PositionSide::Short,
    }
}

/// Plan the effect of filling `size` at `price` against `current`.
///
/// A sign flip is attributed as a close of the whole existing position at
/// `price` followed by an open of the remainder at the same price.
pub fn plan_fill(
    current: Option<&Position>,
    side: OrderSide,
    size: Decimal,
    price: Decimal,
) -> FillPlan {
    let fill_side = side_for(side);

    let Some(pos) = current else {
        return FillPlan {
            transition: Transition::Opened,
            realized_pnl: Decimal::ZERO,
            closed_size: Decimal::ZERO,
            resulting: Some(Resulting {
                side: fill_side,
                size,
                avg_entry_price: price,
            }),
        };
    };

    if pos.side == fill_side {
        let total = pos.size + size;
        let avg = (pos.avg_entry_price * pos.size + price * size) / total;
        return FillPlan {
            transition: Transition::Increased,
            realized_pnl: Decimal::ZERO,
            closed_size: Decimal::ZERO,
            resulting: Some(Resulting {
                side: fill_side,
                size: total,
                avg_entry_price: avg,
            }),
        };
    }

    let closed = size.min(pos.size);
    let realized = pos.side.sign() * (price - pos.avg_entry_price) * closed;

    if size < pos.size {
        FillPlan {
            transition: Transition::Reduced,
            realized_pnl: realized,
            closed_size: closed,
            resulting: Some(Resulting {
                side: pos.side,
                size: pos.size - size,
                avg_entry_price: pos.avg_entry_price,
            }),
        }
    } else if size == pos.size {
        FillPlan {
            transition: Transition::Closed,
            realized_pnl: realized,
            closed_size: closed,
            resulting: None,
        }
    } else {
        FillPlan {
            transition: Transition::Flipped,
            realized_pnl: realized,
            closed_size: closed,
            resulting: Some(Resulting {
                side: fill_side,
                size: size - pos.size,
                avg_entry_price: price,
            }),
        }
    }
}
