//! Objectives — total scalar ranking functions over metrics.
//!
//! A score is always higher-is-better; minimizing objectives (drawdown) are
//! negated internally so the optimizer can sort one way. Scores are clamped
//! finite, and degenerate zero-trade runs land on [`WORST_SCORE`], the same
//! sentinel given to evaluations that fail outright.

use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;

/// Score assigned to degenerate or failed runs: the worst end of the range.
pub const WORST_SCORE: f64 = -1e9;

/// General clamp for non-finite metric values.
const FINITE_CAP: f64 = 1e9;
/// Profit factor clamp (the perfect-run sentinel is +inf).
const PROFIT_FACTOR_CAP: f64 = 1_000.0;

/// Which metric (or combination) ranks a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Maximize net return.
    NetReturn,
    /// Minimize maximum drawdown.
    MaxDrawdown,
    /// Maximize profit factor.
    ProfitFactor,
    /// Maximize win rate.
    WinRate,
    /// Balanced: net return minus half the drawdown.
    #[default]
    Balanced,
}

impl Objective {
    /// Total ranking score for a metrics tuple, higher is better.
    pub fn score(&self, metrics: &Metrics) -> f64 {
        if metrics.trade_count == 0 {
            return WORST_SCORE;
        }
        match self {
            Objective::NetReturn => finite(metrics.net_return_pct, FINITE_CAP),
            Objective::MaxDrawdown => -finite(metrics.max_drawdown_pct, FINITE_CAP),
            Objective::ProfitFactor => finite(metrics.profit_factor, PROFIT_FACTOR_CAP),
            Objective::WinRate => finite(metrics.win_rate, FINITE_CAP),
            Objective::Balanced => {
                finite(metrics.net_return_pct, FINITE_CAP)
                    - 0.5 * finite(metrics.max_drawdown_pct, FINITE_CAP)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Objective::NetReturn => "net_return",
            Objective::MaxDrawdown => "max_drawdown",
            Objective::ProfitFactor => "profit_factor",
            Objective::WinRate => "win_rate",
            Objective::Balanced => "balanced",
        }
    }
}

/// Clamp NaN/inf into a finite range so sorting stays total.
fn finite(x: f64, cap: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(-cap, cap)
}
