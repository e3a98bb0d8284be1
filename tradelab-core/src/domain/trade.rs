//! ClosedTrade — a completed round-trip with its exit cause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::PositionSide;

/// Why a position was closed. The serialized names are the wire codes
/// downstream consumers key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "TRAIL")]
    TrailingStop,
    #[serde(rename = "SIGNAL")]
    Signal,
    #[serde(rename = "REVERSE")]
    Reverse,
    #[serde(rename = "END_OF_DATA")]
    EndOfData,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit => "TP",
            ExitReason::TrailingStop => "TRAIL",
            ExitReason::Signal => "SIGNAL",
            ExitReason::Reverse => "REVERSE",
            ExitReason::EndOfData => "END_OF_DATA",
        };
        write!(f, "{s}")
    }
}

/// A complete round-trip trade: entry fill to exit fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub side: PositionSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Realized PnL, absolute.
    pub pnl: f64,
    /// Realized PnL as a fraction of entry notional.
    pub pnl_pct: f64,
    pub reason: ExitReason,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Holding time of the trade.
    pub fn duration(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> ClosedTrade {
        ClosedTrade {
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            side: PositionSide::Long,
            entry_price: 100.0,
            exit_price: 104.0,
            quantity: 25.0,
            pnl: 100.0,
            pnl_pct: 0.04,
            reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn winner_detection() {
        assert!(sample_trade().is_winner());
        let mut loser = sample_trade();
        loser.pnl = -30.0;
        assert!(!loser.is_winner());
    }

    #[test]
    fn duration_in_days() {
        assert_eq!(sample_trade().duration().num_days(), 3);
    }

    #[test]
    fn reason_wire_names() {
        assert_eq!(ExitReason::EndOfData.to_string(), "END_OF_DATA");
        assert_eq!(
            serde_json::to_string(&ExitReason::StopLoss).unwrap(),
            "\"SL\""
        );
        assert_eq!(
            serde_json::to_string(&ExitReason::EndOfData).unwrap(),
            "\"END_OF_DATA\""
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: ClosedTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
