//! Position — the single open position the engine threads through the bar loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Side;
use crate::domain::Bar;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The market action that opens a position on this side.
    pub fn opening_action(self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// The market action that closes a position on this side.
    pub fn closing_action(self) -> Side {
        self.opening_action().flip()
    }
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

/// The open position. Invariant: the engine holds at most one at any time,
/// and the value is owned by a single run — never shared across evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Stop-loss level, absolute price.
    pub stop: Option<f64>,
    /// Take-profit level, absolute price.
    pub take: Option<f64>,
    /// Trailing-stop distance, absolute price units. `None` disables trailing.
    pub trail_distance: Option<f64>,
    /// Most favorable price reached since entry (high for long, low for short).
    pub best_price: f64,
}

impl Position {
    /// Signed PnL of closing the full quantity at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (exit_price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - exit_price) * self.quantity,
        }
    }

    /// Mark-to-market unrealized PnL at a reference price.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.pnl_at(price)
    }

    /// Fold this bar's extreme into the running favorable extreme.
    ///
    /// Monotone: the extreme never moves against the position, so the
    /// trailing level derived from it can only tighten.
    pub fn update_extreme(&mut self, bar: &Bar) {
        self.best_price = match self.side {
            PositionSide::Long => self.best_price.max(bar.high),
            PositionSide::Short => self.best_price.min(bar.low),
        };
    }

    /// Current trailing-stop trigger level, if trailing is enabled.
    pub fn trail_level(&self) -> Option<f64> {
        self.trail_distance.map(|dist| match self.side {
            PositionSide::Long => self.best_price - dist,
            PositionSide::Short => self.best_price + dist,
        })
    }
}
