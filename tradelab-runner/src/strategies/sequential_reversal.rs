//! Sequential reversal: fade a run of consecutive closes in one direction.

use tradelab_core::domain::{BarSeries, Side, Signal};

use crate::params::{ParamSet, ParamSpec};
use crate::strategy::Strategy;

/// After `run_len` consecutive up (down) closes, go short (long).
pub struct SequentialReversal;

impl Strategy for SequentialReversal {
    fn key(&self) -> &'static str {
        "sequential_reversal"
    }

    fn name(&self) -> &'static str {
        "Sequential Reversal"
    }

    fn description(&self) -> &'static str {
        "After N consecutive bars in one direction, enter reversal."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::int("run_len", 3, "Run length", 2.0, 200.0, 1.0)
            .with_help("Consecutive same-direction closes before fading the run.")]
    }

    fn run(&self, bars: &BarSeries, params: &ParamSet) -> Vec<Signal> {
        let run_len = params
            .get("run_len")
            .and_then(|v| v.as_i64())
            .unwrap_or(3);

        let mut signals = Vec::new();
        let mut streak: i64 = 0;
        for i in 1..bars.len() {
            let prev = bars.get(i - 1).map(|b| b.close).unwrap_or(0.0);
            let bar = match bars.get(i) {
                Some(b) => b,
                None => break,
            };
            let up = prev > 0.0 && bar.close > prev;
            streak = if up {
                if streak >= 0 {
                    streak + 1
                } else {
                    1
                }
            } else if streak <= 0 {
                streak - 1
            } else {
                -1
            };

            if streak >= run_len {
                signals.push(Signal {
                    time: bar.time,
                    side: Side::Sell,
                    price: bar.close,
                });
            } else if streak <= -run_len {
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
