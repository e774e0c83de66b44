use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Long or short. Flat is represented by the absence of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Open position in one symbol. `size` is always positive; direction lives in `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub size: Decimal,
    pub avg_entry_price: Decimal,
    pub last_price: Decimal,
    /// PnL realized by partial reductions while this position stayed open.
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Trailing distance as a fraction of price, and the level it has reached.
    #[serde(default)]
    pub trailing_stop_pct: Option<Decimal>,
    #[serde(default)]
    pub trailing_stop: Option<Decimal>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    pub fn signed_size(&self) -> Decimal {
        self.side.sign() * self.size
    }

    /// Signed value at the last mark.
    pub fn market_value(&self) -> Decimal {
        self.signed_size() * self.last_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.signed_size() * (self.last_price - self.avg_entry_price)
    }

    pub fn mark(&mut self, price: Decimal) {
        self.last_price = price;
    }

    /// Move the trailing stop toward `price`: up only for longs, down only
    /// for shorts. No-op without a trailing distance.
    pub fn trail(&mut self, price: Decimal) {
        let Some(pct) = self.trailing_stop_pct else {
            return;
        };
        let level = match self.side {
            PositionSide::Long => price * (Decimal::ONE - pct),
            PositionSide::Short => price * (Decimal::ONE + pct),
        };
        let tighter = match (self.side, self.trailing_stop) {
            (_, None) => true,
            (PositionSide::Long, Some(current)) => level > current,
            (PositionSide::Short, Some(current)) => level < current,
        };
        if tighter {
            self.trailing_stop = Some(level);
        }
    }

    /// The stop a protective exit should watch: the tighter of the fixed
    /// stop and the trailing level, and whether the trailing one won.
    pub fn effective_stop(&self) -> Option<(Decimal, bool)> {
        match (self.stop_price, self.trailing_stop) {
            (None, None) => None,
            (Some(fixed), None) => Some((fixed, false)),
            (None, Some(trailing)) => Some((trailing, true)),
            (Some(fixed), Some(trailing)) => {
                let trailing_tighter = match self.side {
                    PositionSide::Long => trailing > fixed,
                    PositionSide::Short => trailing < fixed,
                };
                if trailing_tighter {
                    Some((trailing, true))
                } else {
                    Some((fixed, false))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(side: PositionSide) -> Position {
        Position {
            symbol: "SPY".into(),
            side,
            size: dec!(10),
            avg_entry_price: dec!(100),
            last_price: dec!(100),
            realized_pnl: Decimal::ZERO,
            opened_at: DateTime::<Utc>::default(),
            stop_price: None,
            take_profit: None,
            trailing_stop_pct: None,
            trailing_stop: None,
        }
    }

    #[test]
    fn long_unrealized_follows_price() {
        let mut pos = position(PositionSide::Long);
        pos.mark(dec!(105));
        assert_eq!(pos.unrealized_pnl(), dec!(50));
        assert_eq!(pos.market_value(), dec!(1050));
    }

    #[test]
    fn short_unrealized_is_inverted() {
        let mut pos = position(PositionSide::Short);
        pos.mark(dec!(105));
        assert_eq!(pos.unrealized_pnl(), dec!(-50));
        assert_eq!(pos.market_value(), dec!(-1050));
    }

    #[test]
    fn long_trailing_stop_only_ratchets_up() {
        let mut pos = Position {
            trailing_stop_pct: Some(dec!(0.1)),
            ..position(PositionSide::Long)
        };
        pos.trail(dec!(100));
        assert_eq!(pos.trailing_stop, Some(dec!(90)));
        pos.trail(dec!(120));
        assert_eq!(pos.trailing_stop, Some(dec!(108)));
        pos.trail(dec!(110));
        assert_eq!(pos.trailing_stop, Some(dec!(108)));
    }

    #[test]
    fn short_trailing_stop_only_ratchets_down() {
        let mut pos = Position {
            trailing_stop_pct: Some(dec!(0.1)),
            ..position(PositionSide::Short)
        };
        pos.trail(dec!(100));
        assert_eq!(pos.trailing_stop, Some(dec!(110)));
        pos.trail(dec!(80));
        assert_eq!(pos.trailing_stop, Some(dec!(88)));
        pos.trail(dec!(95));
        assert_eq!(pos.trailing_stop, Some(dec!(88)));
    }

    #[test]
    fn effective_stop_picks_tighter_level() {
        let mut pos = Position {
            stop_price: Some(dec!(95)),
            trailing_stop_pct: Some(dec!(0.1)),
            ..position(PositionSide::Long)
        };
        pos.trail(dec!(100));
        assert_eq!(pos.effective_stop(), Some((dec!(95), false)));
        pos.trail(dec!(110));
        assert_eq!(pos.effective_stop(), Some((dec!(99), true)));
    }

    #[test]
    fn untrailed_position_ignores_marks() {
        let mut pos = position(PositionSide::Long);
        pos.trail(dec!(150));
        assert_eq!(pos.trailing_stop, None);
        assert_eq!(pos.effective_stop(), None);
    }
}
