//! Domain types: bars, signals, positions, closed trades.

pub mod bar;
pub mod equity;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, BarSeries, InputError};
pub use equity::EquityPoint;
pub use position::{Position, PositionSide};
pub use signal::{Side, Signal};
pub use trade::{ClosedTrade, ExitReason};
