//! Signals — strategy intents, not yet executed orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a signal: the market action the strategy wants to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A strategy-declared intent to buy or sell at a reference price.
///
/// `time` must match an existing bar exactly; the engine rejects anything
/// else at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
}
