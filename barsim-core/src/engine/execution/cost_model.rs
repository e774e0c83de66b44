//! Cost model: slippage and commission calculation.
//!
//! Slippage is directional: buyers pay more (higher price), sellers receive
//! less (lower price). Commission is a fraction of executed notional.

use crate::domain::order::OrderSide;
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// How the reference price is shifted against the trader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlippageModel {
    #[default]
    None,
    /// Fixed basis points of the reference price.
    FixedBps { bps: Decimal },
    /// Fixed price amount per unit.
    FixedAmount { amount: Decimal },
    /// Uniform draw in `[0, max_bps]` at 0.01 bps resolution, from the
    /// simulator's seeded per-symbol stream.
    RandomBps { max_bps: Decimal },
}

impl SlippageModel {
    /// Per-unit price offset for one fill. Draws from `rng` only when stochastic.
    fn offset(&self, reference: Decimal, rng: &mut StdRng) -> Decimal {
        match self {
            SlippageModel::None => Decimal::ZERO,
            SlippageModel::FixedBps { bps } => reference * *bps / BPS,
            SlippageModel::FixedAmount { amount } => *amount,
            SlippageModel::RandomBps { max_bps } => {
                let steps = (*max_bps * Decimal::ONE_HUNDRED)
                    .trunc()
                    .to_i64()
                    .unwrap_or(0)
                    .max(0);
                let drawn = Decimal::new(rng.gen_range(0..=steps), 2);
                reference * drawn / BPS
            }
        }
    }
}

/// Cost model for execution friction (slippage + commission).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fraction of notional charged per fill (0.001 = 0.1 %).
    pub commission_rate: Decimal,
    pub slippage: SlippageModel,
}

impl CostModel {
    pub fn new(commission_rate: Decimal, slippage: SlippageModel) -> Self {
        Self {
            commission_rate,
            slippage,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(Decimal::ZERO, SlippageModel::None)
    }

    /// Apply slippage to a reference price.
    ///
    /// Returns `(slipped_price, slippage_amount)` where the amount is the total
    /// cost of slippage across `size` units, or `None` on overflow.
    pub fn apply_slippage(
        &self,
        reference: Decimal,
        side: OrderSide,
        size: Decimal,
        rng: &mut StdRng,
    ) -> Option<(Decimal, Decimal)> {
        let offset = self.slippage.offset(reference, rng);
        if offset.is_zero() {
            return Some((reference, Decimal::ZERO));
        }
        let slipped = match side {
            OrderSide::Buy => reference.checked_add(offset)?,
            OrderSide::Sell => reference.checked_sub(offset)?,
        };
        Some((slipped, offset.checked_mul(size)?))
    }

    /// `fee = price × size × commission_rate`, or `None` on overflow.
    pub fn fee(&self, price: Decimal, size: Decimal) -> Option<Decimal> {
        price.checked_mul(size)?.checked_mul(self.commission_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngHierarchy, SLIPPAGE_STREAM};
    use rust_decimal_macros::dec;

    fn rng() -> StdRng {
        RngHierarchy::new(1).rng_for(SLIPPAGE_STREAM, "SPY")
    }

    #[test]
    fn frictionless_returns_reference_price() {
        let cost = CostModel::frictionless();
        let (price, slip) = cost.apply_slippage(dec!(100), OrderSide::Buy, dec!(50), &mut rng()).unwrap();
        assert_eq!(price, dec!(100));
        assert_eq!(slip, Decimal::ZERO);
        assert_eq!(cost.fee(dec!(100), dec!(50)), Some(Decimal::ZERO));
    }

    #[test]
    fn buy_slippage_increases_price() {
        let cost = CostModel::new(Decimal::ZERO, SlippageModel::FixedBps { bps: dec!(10) });
        let (price, slip) = cost.apply_slippage(dec!(100), OrderSide::Buy, dec!(100), &mut rng()).unwrap();
        // 100 * (1 + 10/10000) = 100.10
        assert_eq!(price, dec!(100.1));
        assert_eq!(slip, dec!(10)); // 0.10 * 100 units
    }

    #[test]
    fn sell_slippage_decreases_price() {
        let cost = CostModel::new(Decimal::ZERO, SlippageModel::FixedBps { bps: dec!(10) });
        let (price, slip) = cost.apply_slippage(dec!(100), OrderSide::Sell, dec!(100), &mut rng()).unwrap();
        assert_eq!(price, dec!(99.9));
        assert_eq!(slip, dec!(10));
    }

    #[test]
    fn fixed_amount_per_unit() {
        let cost = CostModel::new(Decimal::ZERO, SlippageModel::FixedAmount { amount: dec!(0.05) });
        let (price, slip) = cost.apply_slippage(dec!(20), OrderSide::Buy, dec!(10), &mut rng()).unwrap();
        assert_eq!(price, dec!(20.05));
        assert_eq!(slip, dec!(0.5));
    }

    #[test]
    fn random_slippage_bounded_and_replayable() {
        let cost = CostModel::new(Decimal::ZERO, SlippageModel::RandomBps { max_bps: dec!(20) });
        let mut a = rng();
        let mut b = rng();
        for _ in 0..100 {
            let (pa, _) = cost.apply_slippage(dec!(100), OrderSide::Buy, dec!(1), &mut a).unwrap();
            let (pb, _) = cost.apply_slippage(dec!(100), OrderSide::Buy, dec!(1), &mut b).unwrap();
            assert_eq!(pa, pb);
            assert!(pa >= dec!(100) && pa <= dec!(100.2));
        }
    }

    #[test]
    fn commission_calculation() {
        let cost = CostModel::new(dec!(0.001), SlippageModel::None);
        assert_eq!(cost.fee(dec!(100), dec!(1)), Some(dec!(0.1)));
        assert_eq!(cost.fee(dec!(100), Decimal::MAX), None);
    }

    #[test]
    fn slippage_model_serde_tagged() {
        let json = r#"{"type":"fixed_bps","bps":"5"}"#;
        let model: SlippageModel = serde_json::from_str(json).unwrap();
        assert_eq!(model, SlippageModel::FixedBps { bps: dec!(5) });
    }
}
