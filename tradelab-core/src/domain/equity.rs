//! Equity snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Equity at a bar close: realized plus mark-to-market unrealized PnL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}
