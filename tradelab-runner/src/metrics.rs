//! Performance metrics — pure functions from trades + equity curve to scalars.
//!
//! Every metric is defined for the zero-trade case; nothing here can fail.

use serde::{Deserialize, Serialize};
use tradelab_core::domain::{ClosedTrade, EquityPoint};

/// Sentinel profit factor for a run with gross profit and zero gross loss.
pub const PROFIT_FACTOR_PERFECT: f64 = f64::INFINITY;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// (final / initial) - 1.
    pub net_return_pct: f64,
    /// Largest peak-to-trough decline, as a positive fraction.
    pub max_drawdown_pct: f64,
    /// Gross profit / gross loss; see [`profit_factor`] for edge cases.
    pub profit_factor: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub avg_trade_duration_secs: f64,
}

impl Metrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(initial_equity: f64, curve: &[EquityPoint], trades: &[ClosedTrade]) -> Self {
        Self {
            net_return_pct: net_return_pct(initial_equity, curve),
            max_drawdown_pct: max_drawdown_pct(curve),
            profit_factor: profit_factor(trades),
            win_rate: win_rate(trades),
            trade_count: trades.len(),
            avg_trade_duration_secs: avg_trade_duration_secs(trades),
        }
    }

    /// All-zero metrics: the shape of a run that never evaluated.
    pub fn zero() -> Self {
        Self {
            net_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            profit_factor: 0.0,
            win_rate: 0.0,
            trade_count: 0,
            avg_trade_duration_secs: 0.0,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Net return as a fraction of initial equity.
pub fn net_return_pct(initial_equity: f64, curve: &[EquityPoint]) -> f64 {
    match curve.last() {
        Some(last) if initial_equity > 0.0 => last.equity / initial_equity - 1.0,
        _ => 0.0,
    }
}

/// Maximum drawdown as a positive fraction (0.15 = a 15% decline).
pub fn max_drawdown_pct(curve: &[EquityPoint]) -> f64 {
    let mut peak = match curve.first() {
        Some(p) => p.equity,
        None => return 0.0,
    };
    let mut max_dd = 0.0f64;
    for point in curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}

/// Gross profit / gross loss.
///
/// 0.0 with no trades or no gross profit; [`PROFIT_FACTOR_PERFECT`] when
/// gross loss is zero and gross profit positive.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        PROFIT_FACTOR_PERFECT
    } else {
        0.0
    }
}

/// Fraction of trades with positive PnL.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Mean holding time across trades, in seconds.
pub fn avg_trade_duration_secs(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let total: i64 = trades.iter().map(|t| t.duration().num_seconds()).sum();
    total as f64 / trades.len() as f64
}
