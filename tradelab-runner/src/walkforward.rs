//! Walk-forward harness: rolling train/test optimization with stability
//! diagnostics.
//!
//! The bar span is cut into rolling windows of fixed train and test length,
//! advanced by a fixed step (all bar-indexed). Each window optimizes on its
//! TRAIN slice only, then re-runs the engine with the winning parameters on
//! the TEST slice — the test slice is never touched until train optimization
//! has completed, which is the whole point of the methodology.
//!
//! Diagnostics per window: `param_drift`, a normalized distance in [0, 1]
//! between consecutive winning parameter sets (numeric fields scaled by the
//! ParamSpec range, categorical fields Hamming), and `performance_decay`,
//! test score / train score (`None` when the train score is zero).
//!
//! All TEST equity curves concatenate into one out-of-sample series, each
//! window re-based multiplicatively so it continues from the previous
//! window's final equity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tradelab_core::domain::BarSeries;
use tradelab_core::engine::{run_backtest, EngineConfig, EngineError};

use crate::metrics::Metrics;
use crate::objective::Objective;
use crate::optimize::{run_sweep, SweepConfig, SweepError};
use crate::params::{ParamSet, ParamSpec, ParamValue};
use crate::strategy::Strategy;

// ─── Configuration ───────────────────────────────────────────────────

/// Window geometry, in bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub train_bars: usize,
    pub test_bars: usize,
    pub step_bars: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        // One year of daily bars to train, a quarter to test, advanced a
        // quarter at a time.
        Self {
            train_bars: 252,
            test_bars: 63,
            step_bars: 63,
        }
    }
}

/// Errors from walk-forward validation.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {total_bars} bars cannot fit train {train_bars} + test {test_bars}")]
    InsufficientData {
        total_bars: usize,
        train_bars: usize,
        test_bars: usize,
    },
    #[error("step_bars must be positive")]
    ZeroStep,
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error("backtest failed on window {window}: {source}")]
    Backtest {
        window: usize,
        #[source]
        source: EngineError,
    },
}

// ─── Window partitioning ─────────────────────────────────────────────

/// Bar-index bounds of one window; ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub window_id: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// Partition `total_bars` into rolling windows.
///
/// Candidate count is floor((total − train) / step) + 1; any window whose
/// test segment would run past the horizon is dropped.
pub fn create_windows(
    total_bars: usize,
    cfg: &WalkForwardConfig,
) -> Result<Vec<WindowSpec>, WalkForwardError> {
    if cfg.step_bars == 0 {
        return Err(WalkForwardError::ZeroStep);
    }
    let insufficient = || WalkForwardError::InsufficientData {
        total_bars,
        train_bars: cfg.train_bars,
        test_bars: cfg.test_bars,
    };
    if total_bars < cfg.train_bars || cfg.train_bars == 0 || cfg.test_bars == 0 {
        return Err(insufficient());
    }

    let candidates = (total_bars - cfg.train_bars) / cfg.step_bars + 1;
    let mut windows = Vec::new();
    for i in 0..candidates {
        let train_start = i * cfg.step_bars;
        let train_end = train_start + cfg.train_bars;
        let test_end = train_end + cfg.test_bars;
        if test_end > total_bars {
            break;
        }
        windows.push(WindowSpec {
            window_id: windows.len(),
            train_start,
            train_end,
            test_start: train_end,
            test_end,
        });
    }

    if windows.is_empty() {
        return Err(insufficient());
    }
    Ok(windows)
}

// ─── Results ─────────────────────────────────────────────────────────

/// One walk-forward window: bounds, winning parameters, both-side metrics,
/// and stability diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct WindowResult {
    pub window_id: usize,
    pub spec: WindowSpec,
    pub train_start_time: DateTime<Utc>,
    pub train_end_time: DateTime<Utc>,
    pub test_start_time: DateTime<Utc>,
    pub test_end_time: DateTime<Utc>,
    pub best_params: ParamSet,
    pub train_metrics: Metrics,
    pub test_metrics: Metrics,
    pub train_score: f64,
    pub test_score: f64,
    /// Normalized distance to the previous window's best parameters; 0 for
    /// the first window.
    pub param_drift: f64,
    /// test score / train score; `None` when the train score is zero.
    pub performance_decay: Option<f64>,
}

/// One point of the concatenated out-of-sample equity series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OosPoint {
    pub window_id: usize,
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// Complete walk-forward output.
#[derive(Debug, Clone)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowResult>,
    pub oos_equity: Vec<OosPoint>,
}

// ─── Parameter drift ─────────────────────────────────────────────────

/// Mean per-key distance in [0, 1] between two parameter assignments.
///
/// Numeric keys scale |a − b| by the ParamSpec min/max range when declared
/// (falling back to |a − b| / max(|a|, |b|, 1)); categorical keys and
/// missing/mismatched keys count 1. Returns 0.0 when `prev` is absent.
pub fn param_drift(prev: Option<&ParamSet>, cur: &ParamSet, schema: &[ParamSpec]) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };
    let keys: std::collections::BTreeSet<&String> = prev.keys().chain(cur.keys()).collect();
    if keys.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for key in &keys {
        total += key_distance(prev.get(*key), cur.get(*key), schema, key);
    }
    total / keys.len() as f64
}

fn key_distance(
    a: Option<&ParamValue>,
    b: Option<&ParamValue>,
    schema: &[ParamSpec],
    key: &str,
) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 1.0;
    };
    if a == b {
        return 0.0;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let span = schema
                .iter()
                .find(|s| s.key == key)
                .and_then(|s| match (s.min, s.max) {
                    (Some(min), Some(max)) if max > min => Some(max - min),
                    _ => None,
                })
                .unwrap_or_else(|| x.abs().max(y.abs()).max(1.0));
            ((x - y).abs() / span).min(1.0)
        }
        _ => 1.0,
    }
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run the full walk-forward: optimize each TRAIN slice, evaluate the winner
/// out-of-sample, concatenate the re-based TEST equity curves.
pub fn run_walk_forward(
    bars: &BarSeries,
    strategy: &dyn Strategy,
    grid_tokens: &[String],
    engine_cfg: &EngineConfig,
    objective: Objective,
    sweep_cfg: &SweepConfig,
    wf_cfg: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    let specs = create_windows(bars.len(), wf_cfg)?;
    let schema = strategy.params();

    let mut windows = Vec::with_capacity(specs.len());
    let mut oos_equity = Vec::new();
    let mut prev_best: Option<ParamSet> = None;
    let mut chain_equity = engine_cfg.initial_equity;

    for spec in specs {
        let train = bars.slice(spec.train_start, spec.train_end);

        // Optimize on TRAIN only; the test slice is not created until the
        // sweep below has completed.
        let sweep = run_sweep(&train, strategy, grid_tokens, engine_cfg, objective, sweep_cfg)?;
        let Some(best) = sweep.best() else {
            debug!(window = spec.window_id, "sweep returned no rows; skipping window");
            continue;
        };
        let best_params = best.params.clone();
        let train_metrics = best.metrics.clone();
        let train_score = best.score;

        // Out-of-sample: the exact winning parameters on the TEST slice.
        let test = bars.slice(spec.test_start, spec.test_end);
        let signals = strategy.run(&test, &best_params);
        let result = run_backtest(&test, &signals, engine_cfg).map_err(|source| {
            WalkForwardError::Backtest {
                window: spec.window_id,
                source,
            }
        })?;
        let test_metrics =
            Metrics::compute(engine_cfg.initial_equity, &result.equity_curve, &result.trades);
        let test_score = objective.score(&test_metrics);

        let drift = param_drift(prev_best.as_ref(), &best_params, &schema);
        prev_best = Some(best_params.clone());

        let performance_decay = if train_score == 0.0 {
            None
        } else {
            Some(test_score / train_score)
        };

        // Re-base this window's curve so it continues from the chain.
        let factor = chain_equity / engine_cfg.initial_equity;
        for point in &result.equity_curve {
            oos_equity.push(OosPoint {
                window_id: spec.window_id,
                time: point.time,
                equity: point.equity * factor,
            });
        }
        if let Some(last) = oos_equity.last() {
            chain_equity = last.equity;
        }

        windows.push(WindowResult {
            window_id: spec.window_id,
            spec,
            train_start_time: train.first().time,
            train_end_time: train.last().time,
            test_start_time: test.first().time,
            test_end_time: test.last().time,
            best_params,
            train_metrics,
            test_metrics,
            train_score,
            test_score,
            param_drift: drift,
            performance_decay,
        });
    }

    Ok(WalkForwardResult {
        windows,
        oos_equity,
    })
}
