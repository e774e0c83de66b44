use crate::domain::order::Order;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fill record.
///
/// `price` is the executed price after slippage; `reference_price` is what
/// the bar offered before costs. `realized_pnl` and `closed_size` are
/// attributed by the ledger when the fill is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order: Order,
    pub size: Decimal,
    pub reference_price: Decimal,
    pub price: Decimal,
    pub slippage: Decimal,
    pub fee: Decimal,
    pub realized_pnl: Decimal,
    pub closed_size: Decimal,
    pub timestamp: DateTime<Utc>,
    /// True when volume participation capped the fill below the order size.
    pub partial: bool,
}

impl Fill {
    pub fn symbol(&self) -> &str {
        &self.order.symbol
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }

    /// Size with sign: positive for buys, negative for sells.
    pub fn signed_size(&self) -> Decimal {
        self.order.side.sign() * self.size
    }

    /// Cash delta this fill applies: proceeds of a sell, cost of a buy, fee always out.
    /// `None` when the notional does not fit in a `Decimal`.
    pub fn cash_delta(&self) -> Option<Decimal> {
        let notional = self.signed_size().checked_mul(self.price)?;
        (-notional).checked_sub(self.fee)
    }
}
