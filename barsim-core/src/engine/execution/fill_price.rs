//! Fill price computation: picks the base price for an order on a bar and
//! applies the cost model to it.
//!
//! Market orders start from the configured reference price and take slippage.
//! Limit orders fill at the better of reference and limit, without slippage,
//! only when the bar traded through the limit. Protective stops fill at the
//! stop level, or at the open when the bar gapped through it, with slippage;
//! take-profits fill at their level (or a favourable gap open) without it.

use crate::domain::order::{Order, OrderSide};
use crate::domain::signal::ExitTrigger;
use crate::domain::Bar;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;
use super::FillRejection;

/// Which bar price market orders execute against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePrice {
    Open,
    #[default]
    Close,
    /// Typical price `(high + low + close) / 3`.
    Vwap,
}

impl ReferencePrice {
    pub fn price(self, bar: &Bar) -> Decimal {
        match self {
            ReferencePrice::Open => bar.open,
            ReferencePrice::Close => bar.close,
            ReferencePrice::Vwap => bar.typical_price(),
        }
    }
}

/// The fully computed fill price with all costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedFill {
    /// Price before slippage.
    pub reference: Decimal,
    /// Final fill price after slippage.
    pub price: Decimal,
    /// Total slippage cost across the filled size.
    pub slippage: Decimal,
    pub fee: Decimal,
}

/// Base price and whether slippage applies.
fn base_price(order: &Order, bar: &Bar, reference: ReferencePrice) -> Result<(Decimal, bool), FillRejection> {
    if let Some(trigger) = order.trigger {
        return trigger_price(order, trigger, bar);
    }
    let reference = reference.price(bar);
    match order.limit_price {
        None => Ok((reference, true)),
        Some(limit) => limit_price(order.side, limit, reference, bar)
            .map(|p| (p, false))
            .ok_or(FillRejection::LimitNotReached { limit }),
    }
}

/// Buy limit fills if the low reached the limit; sell limit if the high did.
fn limit_price(side: OrderSide, limit: Decimal, reference: Decimal, bar: &Bar) -> Option<Decimal> {
    match side {
        OrderSide::Buy if bar.low <= limit => Some(reference.min(limit)),
        OrderSide::Sell if bar.high >= limit => Some(reference.max(limit)),
        _ => None,
    }
}

/// Protective exits fill at their level, or at the open when the bar gapped
/// through it. A level the bar never traded at does not fill.
fn trigger_price(order: &Order, trigger: ExitTrigger, bar: &Bar) -> Result<(Decimal, bool), FillRejection> {
    let (level, slips) = match trigger {
        ExitTrigger::StopLoss | ExitTrigger::TrailingStop => (order.stop_price, true),
        ExitTrigger::TakeProfit => (order.take_profit, false),
    };
    let Some(level) = level else {
        return Err(FillRejection::Refused {
            reason: format!("{trigger:?} exit without a level"),
        });
    };
    // Selling out of a long: a gap down through the stop fills at the open.
    let is_stop = trigger != ExitTrigger::TakeProfit;
    let gapped = match (is_stop, order.side) {
        (true, OrderSide::Sell) | (false, OrderSide::Buy) => bar.open <= level,
        (true, OrderSide::Buy) | (false, OrderSide::Sell) => bar.open >= level,
    };
    if gapped {
        return Ok((bar.open, slips));
    }
    if level < bar.low || level > bar.high {
        return Err(FillRejection::LevelNotReached { level });
    }
    Ok((level, slips))
}

/// Compute the final fill for `size` units of `order` on `bar`.
pub fn compute_fill(
    order: &Order,
    bar: &Bar,
    size: Decimal,
    reference: ReferencePrice,
    cost_model: &CostModel,
    rng: &mut StdRng,
) -> Result<ComputedFill, FillRejection> {
    let (base, slips) = base_price(order, bar, reference)?;
    let overflow = || FillRejection::Overflow { size };
    let (price, slippage) = if slips {
        cost_model
            .apply_slippage(base, order.side, size, rng)
            .ok_or_else(overflow)?
    } else {
        (base, Decimal::ZERO)
    };
    let fee = cost_model.fee(price, size).ok_or_else(overflow)?;
    Ok(ComputedFill {
        reference: base,
        price,
        slippage,
        fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Signal;
    use crate::engine::execution::cost_model::SlippageModel;
    use crate::rng::{RngHierarchy, SLIPPAGE_STREAM};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar::new(
            "SPY",
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            dec!(1000),
        )
    }

    fn rng() -> StdRng {
        RngHierarchy::new(0).rng_for(SLIPPAGE_STREAM, "SPY")
    }

    fn slippy() -> CostModel {
        CostModel::new(dec!(0.001), SlippageModel::FixedBps { bps: dec!(10) })
    }

    fn order(signal: Signal) -> Order {
        Order::from_signal(&signal, signal.size)
    }

    // ── Reference prices ──

    #[test]
    fn reference_price_variants() {
        let b = bar(dec!(100), dec!(110), dec!(90), dec!(103));
        assert_eq!(ReferencePrice::Open.price(&b), dec!(100));
        assert_eq!(ReferencePrice::Close.price(&b), dec!(103));
        assert_eq!(ReferencePrice::Vwap.price(&b), dec!(101));
    }

    #[test]
    fn market_buy_pays_slippage_and_fee() {
        let b = bar(dec!(100), dec!(101), dec!(99), dec!(100));
        let o = order(Signal::open_long("SPY", dec!(10)));
        let fill = compute_fill(&o, &b, dec!(10), ReferencePrice::Close, &slippy(), &mut rng()).unwrap();
        assert_eq!(fill.reference, dec!(100));
        assert_eq!(fill.price, dec!(100.1));
        assert_eq!(fill.slippage, dec!(1));
        assert_eq!(fill.fee, dec!(1.001));
    }

    // ── Limit orders ──

    #[test]
    fn buy_limit_fills_at_better_price_without_slippage() {
        let b = bar(dec!(100), dec!(101), dec!(95), dec!(100));
        let o = order(Signal::open_long("SPY", dec!(1)).with_limit(dec!(97)));
        let fill = compute_fill(&o, &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()).unwrap();
        assert_eq!(fill.price, dec!(97));
        assert_eq!(fill.slippage, Decimal::ZERO);
    }

    #[test]
    fn buy_limit_above_reference_fills_at_reference() {
        let b = bar(dec!(100), dec!(101), dec!(95), dec!(100));
        let o = order(Signal::open_long("SPY", dec!(1)).with_limit(dec!(102)));
        let fill = compute_fill(&o, &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()).unwrap();
        assert_eq!(fill.price, dec!(100));
    }

    #[test]
    fn sell_limit_not_reached() {
        let b = bar(dec!(100), dec!(101), dec!(95), dec!(100));
        let o = order(Signal::close_long("SPY", dec!(1)).with_limit(dec!(105)));
        assert_eq!(
            compute_fill(&o, &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()),
            Err(FillRejection::LimitNotReached { limit: dec!(105) })
        );
    }

    // ── Protective triggers ──

    #[test]
    fn long_stop_fills_at_stop_with_slippage() {
        let b = bar(dec!(100), dec!(101), dec!(94), dec!(96));
        let sig = Signal::close_long("SPY", dec!(1))
            .with_stop(dec!(95))
            .with_trigger(ExitTrigger::StopLoss);
        let fill = compute_fill(&order(sig), &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()).unwrap();
        assert_eq!(fill.reference, dec!(95));
        assert_eq!(fill.price, dec!(94.905));
    }

    #[test]
    fn long_stop_gap_fills_at_open() {
        let b = bar(dec!(90), dec!(92), dec!(88), dec!(91));
        let sig = Signal::close_long("SPY", dec!(1))
            .with_stop(dec!(95))
            .with_trigger(ExitTrigger::StopLoss);
        let fill = compute_fill(&order(sig), &b, dec!(1), ReferencePrice::Close, &CostModel::frictionless(), &mut rng()).unwrap();
        assert_eq!(fill.price, dec!(90));
    }

    #[test]
    fn short_take_profit_fills_at_target_without_slippage() {
        let b = bar(dec!(100), dec!(101), dec!(89), dec!(95));
        let sig = Signal::close_short("SPY", dec!(1))
            .with_take_profit(dec!(90))
            .with_trigger(ExitTrigger::TakeProfit);
        let fill = compute_fill(&order(sig), &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()).unwrap();
        assert_eq!(fill.price, dec!(90));
        assert_eq!(fill.slippage, Decimal::ZERO);
    }

    #[test]
    fn take_profit_outside_bar_range_does_not_fill() {
        let b = bar(dec!(100), dec!(101), dec!(99), dec!(100));
        let sig = Signal::close_long("SPY", dec!(1))
            .with_take_profit(dec!(200))
            .with_trigger(ExitTrigger::TakeProfit);
        assert_eq!(
            compute_fill(&order(sig), &b, dec!(1), ReferencePrice::Close, &slippy(), &mut rng()),
            Err(FillRejection::LevelNotReached { level: dec!(200) })
        );
    }

    #[test]
    fn trailing_stop_prices_like_a_stop() {
        let b = bar(dec!(100), dec!(101), dec!(94), dec!(96));
        let sig = Signal::close_long("SPY", dec!(1))
            .with_stop(dec!(97))
            .with_trigger(ExitTrigger::TrailingStop);
        let fill = compute_fill(&order(sig), &b, dec!(1), ReferencePrice::Close, &CostModel::frictionless(), &mut rng()).unwrap();
        assert_eq!(fill.price, dec!(97));
    }

    #[test]
    fn overflowing_fee_is_rejected() {
        let b = bar(dec!(100), dec!(101), dec!(99), dec!(100));
        let o = order(Signal::open_long("SPY", Decimal::MAX));
        assert_eq!(
            compute_fill(&o, &b, Decimal::MAX, ReferencePrice::Close, &slippy(), &mut rng()),
            Err(FillRejection::Overflow { size: Decimal::MAX })
        );
    }
}
