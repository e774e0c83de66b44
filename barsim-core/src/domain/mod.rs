//! Domain types for barsim

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod signal;

pub use bar::{Bar, BarError};
pub use fill::Fill;
pub use ids::{ContentHash, IdGen, SignalId};
pub use order::{Order, OrderSide};
pub use portfolio::{LedgerError, PortfolioLedger};
pub use position::{Position, PositionSide};
pub use signal::{ExitTrigger, Intent, Signal};
