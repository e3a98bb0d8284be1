//! Sigma extreme: fade closes beyond a rolling z-score band.

use tradelab_core::domain::{BarSeries, Side, Signal};

use crate::params::{ParamSet, ParamSpec};
use crate::strategy::Strategy;

/// Contrarian band strategy: short above mean + sigma·std, long below
/// mean − sigma·std, over a rolling window of closes.
pub struct SigmaExtreme;

impl Strategy for SigmaExtreme {
    fn key(&self) -> &'static str {
        "sigma_extreme"
    }

    fn name(&self) -> &'static str {
        "Sigma Extreme"
    }

    fn description(&self) -> &'static str {
        "Z-score extremes on rolling mean/std; fade extremes (contrarian)."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("window", 20, "Window", 2.0, 500.0, 1.0)
                .with_help("Rolling window (bars)."),
            ParamSpec::float("sigma", 2.0, "Sigma", 0.1, 10.0, 0.1)
                .with_help("Std-dev multiple."),
        ]
    }

    fn run(&self, bars: &BarSeries, params: &ParamSet) -> Vec<Signal> {
        let window = params
            .get("window")
            .and_then(|v| v.as_i64())
            .unwrap_or(20)
            .max(2) as usize;
        let sigma = params.get("sigma").and_then(|v| v.as_f64()).unwrap_or(2.0);

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut signals = Vec::new();
        for i in window..closes.len() {
            let slice = &closes[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let var = slice.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
                / (window - 1) as f64;
            let std = var.sqrt();
            if std <= 0.0 {
                continue;
            }
            let bar = match bars.get(i) {
                Some(b) => b,
                None => break,
            };
            if bar.close > mean + sigma * std {
                signals.push(Signal {
                    time: bar.time,
                    side: Side::Sell,
                    price: bar.close,
                });
            } else if bar.close < mean - sigma * std {
                signals.push(Signal {
                    time: bar.time,
                    side: Side::Buy,
                    price: bar.close,
                });
            }
        }
        signals
    }
}
