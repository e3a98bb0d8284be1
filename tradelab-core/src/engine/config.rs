//! Engine configuration — validated before a single bar is processed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from out-of-range configuration. A run with a bad config is
/// rejected before execution starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("initial_equity must be positive and finite (got {0})")]
    BadInitialEquity(f64),
    #[error("{name} must be non-negative and finite (got {value})")]
    NegativeValue { name: &'static str, value: f64 },
    #[error("{name} must be a positive finite fraction (got {value})")]
    BadFraction { name: &'static str, value: f64 },
}

/// How much to put on when a position opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSizePolicy {
    /// Risk a fixed fraction of current equity against the stop distance.
    /// Without a stop-loss the fraction applies to notional instead.
    RiskFraction { fraction: f64 },
    /// Fixed number of units per position.
    FixedQuantity { quantity: f64 },
    /// Fixed notional value per position.
    FixedNotional { notional: f64 },
}

impl Default for PositionSizePolicy {
    fn default() -> Self {
        PositionSizePolicy::RiskFraction { fraction: 0.01 }
    }
}

impl PositionSizePolicy {
    /// Quantity for a fill at `price` with current realized `equity`.
    ///
    /// `stop_distance` is the absolute distance to the stop level when a
    /// stop-loss is configured.
    pub fn quantity(&self, equity: f64, price: f64, stop_distance: Option<f64>) -> f64 {
        match *self {
            PositionSizePolicy::RiskFraction { fraction } => {
                let risk_dollars = equity * fraction;
                match stop_distance {
                    Some(dist) => risk_dollars / dist.max(1e-9),
                    None => risk_dollars / price.max(1e-9),
                }
            }
            PositionSizePolicy::FixedQuantity { quantity } => quantity,
            PositionSizePolicy::FixedNotional { notional } => notional / price.max(1e-9),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (name, value): (&'static str, f64) = match *self {
            PositionSizePolicy::RiskFraction { fraction } => ("risk fraction", fraction),
            PositionSizePolicy::FixedQuantity { quantity } => ("fixed quantity", quantity),
            PositionSizePolicy::FixedNotional { notional } => ("fixed notional", notional),
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::BadFraction { name, value });
        }
        Ok(())
    }
}

/// Full engine configuration for one run.
///
/// Percent fields are fractions of entry price (0.01 = 1%); `None` disables
/// the corresponding exit. Latency is measured in bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_equity: f64,
    pub position_size_policy: PositionSizePolicy,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub trailing_stop_pct: Option<f64>,
    /// Close and flip on an opposite-direction signal; when false, the
    /// opposite signal closes the position without reopening.
    pub allow_reverse: bool,
    pub entry_slippage_bps: f64,
    pub exit_slippage_bps: f64,
    pub entry_latency_bars: u32,
    pub exit_latency_bars: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 100_000.0,
            position_size_policy: PositionSizePolicy::default(),
            stop_loss_pct: Some(0.01),
            take_profit_pct: Some(0.02),
            trailing_stop_pct: None,
            allow_reverse: true,
            entry_slippage_bps: 0.0,
            exit_slippage_bps: 0.0,
            entry_latency_bars: 0,
            exit_latency_bars: 0,
        }
    }
}

impl EngineConfig {
    /// Reject out-of-range configuration before execution.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(ConfigError::BadInitialEquity(self.initial_equity));
        }
        self.position_size_policy.validate()?;
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::BadFraction { name, value: v });
                }
            }
        }
        for (name, value) in [
            ("entry_slippage_bps", self.entry_slippage_bps),
            ("exit_slippage_bps", self.exit_slippage_bps),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeValue { name, value });
            }
        }
        Ok(())
    }
}
