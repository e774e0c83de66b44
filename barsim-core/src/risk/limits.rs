//! Individual limit checks for opening signals.
//!
//! Each check is a pure function of the candidate size, the ledger, and the
//! configured limit. Size-only checks report the largest size they would
//! allow; the policy decides whether that becomes a resize or a reject.

use super::decision::{RejectReason, ResizeReason};
use crate::domain::{PortfolioLedger, Position, PositionSide};
use rust_decimal::Decimal;

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    /// Size violation: at most `allowed` units would pass this check.
    TooLarge {
        allowed: Decimal,
        reason: ResizeReason,
        reject: RejectReason,
    },
    Reject(RejectReason),
}

/// What the signal is about to do to its symbol, seen from the ledger.
#[derive(Debug, Clone, Copy)]
pub struct Exposure {
    pub price: Decimal,
    pub equity: Decimal,
    /// Units already held on the signal's side.
    pub same_side: Decimal,
    /// Units held on the opposite side, which the fill closes first.
    pub opposite: Decimal,
}

impl Exposure {
    pub fn new(position: Option<&Position>, side: PositionSide, price: Decimal, equity: Decimal) -> Self {
        let (same_side, opposite) = match position {
            Some(p) if p.side == side => (p.size, Decimal::ZERO),
            Some(p) => (Decimal::ZERO, p.size),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        Self {
            price,
            equity,
            same_side,
            opposite,
        }
    }
}

fn too_large(size: Decimal, allowed: Decimal, reason: ResizeReason, reject: RejectReason) -> Check {
    if size <= allowed {
        Check::Pass
    } else {
        Check::TooLarge {
            allowed: allowed.max(Decimal::ZERO),
            reason,
            reject,
        }
    }
}

/// (a) Per-symbol cap on the resulting same-side position, in units and/or
/// as a fraction of equity at the current mark.
pub fn position_limit(
    size: Decimal,
    ctx: &Exposure,
    max_units: Option<Decimal>,
    max_pct: Option<Decimal>,
) -> Check {
    let pct_units = max_pct.map(|pct| {
        (pct * ctx.equity)
            .checked_div(ctx.price)
            .unwrap_or(Decimal::MAX)
    });
    let cap = match (max_units, pct_units) {
        (Some(u), Some(p)) => u.min(p),
        (Some(u), None) => u,
        (None, Some(p)) => p,
        (None, None) => return Check::Pass,
    };
    let allowed = cap.saturating_sub(ctx.same_side).saturating_add(ctx.opposite);
    too_large(
        size,
        allowed,
        ResizeReason::PositionLimit,
        RejectReason::PositionLimit {
            allowed: allowed.max(Decimal::ZERO),
        },
    )
}

/// (b) Aggregate gross exposure across all symbols as a fraction of equity.
///
/// Units that close the opposite side reduce exposure, so a reversal may use
/// the closed amount twice over.
pub fn exposure_limit(
    size: Decimal,
    ctx: &Exposure,
    ledger: &PortfolioLedger,
    max_pct: Option<Decimal>,
) -> Check {
    let Some(pct) = max_pct else {
        return Check::Pass;
    };
    if size <= ctx.opposite {
        return Check::Pass;
    }
    let cap = pct * ctx.equity;
    let headroom = ((cap - ledger.exposure()).checked_div(ctx.price))
        .and_then(|units| units.checked_add(ctx.opposite.checked_mul(Decimal::TWO)?))
        .unwrap_or(Decimal::MAX);
    let allowed = headroom.max(ctx.opposite);
    too_large(
        size,
        allowed,
        ResizeReason::ExposureLimit,
        RejectReason::ExposureLimit {
            allowed: allowed.max(Decimal::ZERO),
        },
    )
}

/// (c) Reject while drawdown from the running peak is at or past the limit.
pub fn drawdown(ledger: &PortfolioLedger, max_pct: Option<Decimal>) -> Check {
    match max_pct {
        Some(limit) if ledger.drawdown() >= limit => Check::Reject(RejectReason::DrawdownBreach {
            drawdown: ledger.drawdown(),
            limit,
        }),
        _ => Check::Pass,
    }
}

/// Loss since the start of the day as a fraction of that day's starting equity.
pub fn daily_loss(day_start_equity: Decimal, equity: Decimal) -> Decimal {
    if day_start_equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((day_start_equity - equity) / day_start_equity).max(Decimal::ZERO)
}

/// (e) The loss implied by the signal's stop must stay within the cap.
pub fn trade_loss(
    size: Decimal,
    ctx: &Exposure,
    stop: Option<Decimal>,
    max_pct: Option<Decimal>,
) -> Check {
    let (Some(stop), Some(pct)) = (stop, max_pct) else {
        return Check::Pass;
    };
    let per_unit = (ctx.price - stop).abs();
    if per_unit.is_zero() {
        return Check::Pass;
    }
    let cap = pct * ctx.equity;
    too_large(
        size,
        cap.checked_div(per_unit).unwrap_or(Decimal::MAX),
        ResizeReason::TradeLossCap,
        RejectReason::TradeLossCap {
            implied_loss: size.checked_mul(per_unit).unwrap_or(Decimal::MAX),
            cap,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat(price: Decimal, equity: Decimal) -> Exposure {
        Exposure {
            price,
            equity,
            same_side: Decimal::ZERO,
            opposite: Decimal::ZERO,
        }
    }

    #[test]
    fn position_pct_allows_five_units() {
        // 5 % of 10,000 at 100 → 5 units
        let check = position_limit(dec!(20), &flat(dec!(100), dec!(10000)), None, Some(dec!(0.05)));
        assert!(matches!(check, Check::TooLarge { allowed, .. } if allowed == dec!(5)));
    }

    #[test]
    fn position_limit_counts_existing_same_side() {
        let ctx = Exposure {
            same_side: dec!(3),
            ..flat(dec!(100), dec!(10000))
        };
        let check = position_limit(dec!(4), &ctx, Some(dec!(5)), None);
        assert!(matches!(check, Check::TooLarge { allowed, .. } if allowed == dec!(2)));
    }

    #[test]
    fn position_limit_credits_opposite_side() {
        let ctx = Exposure {
            opposite: dec!(5),
            ..flat(dec!(100), dec!(10000))
        };
        assert_eq!(position_limit(dec!(10), &ctx, Some(dec!(5)), None), Check::Pass);
    }

    #[test]
    fn trade_loss_cap_from_stop_distance() {
        // cap 1 % of 10,000 = 100; stop 5 away → 20 units
        let check = trade_loss(
            dec!(50),
            &flat(dec!(100), dec!(10000)),
            Some(dec!(95)),
            Some(dec!(0.01)),
        );
        assert!(matches!(check, Check::TooLarge { allowed, .. } if allowed == dec!(20)));
    }

    #[test]
    fn trade_loss_without_stop_passes() {
        let check = trade_loss(dec!(50), &flat(dec!(100), dec!(10000)), None, Some(dec!(0.01)));
        assert_eq!(check, Check::Pass);
    }

    #[test]
    fn daily_loss_is_never_negative() {
        assert_eq!(daily_loss(dec!(1000), dec!(1100)), Decimal::ZERO);
        assert_eq!(daily_loss(dec!(1000), dec!(950)), dec!(0.05));
    }

    #[test]
    fn tiny_price_does_not_overflow_position_cap() {
        let ctx = flat(Decimal::new(1, 28), dec!(10000));
        assert_eq!(position_limit(dec!(1), &ctx, None, Some(dec!(0.5))), Check::Pass);
    }
}
