//! Parameter optimizer: grid and random search over a declared domain.
//!
//! Grid domains come from sweep tokens (`window=10:60:5`, `sigma=1.5,2.0`,
//! `window=*` for ParamSpec-derived auto-grids). The full grid size is
//! computed before any backtest runs; a grid larger than the configured hard
//! cap fails fast with [`SweepError::GridExplosion`]. `max_evals` bounds how
//! many combinations actually evaluate (grid traversal is truncated, random
//! search draws exactly that many).
//!
//! Evaluations are independent and side-effect-free, so they fan out over a
//! rayon pool; results are collected by original evaluation index, never by
//! completion order, which keeps rankings reproducible regardless of
//! scheduling. A failing evaluation becomes a worst-sentinel row instead of
//! aborting the sweep.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tradelab_core::domain::BarSeries;
use tradelab_core::engine::{run_backtest, EngineConfig};

use crate::fingerprint::run_id;
use crate::metrics::Metrics;
use crate::objective::{Objective, WORST_SCORE};
use crate::params::{coerce, find_spec, merge_params, ParamError, ParamSet, ParamSpec, ParamType, ParamValue};
use crate::strategy::{Strategy, StrategyError};

/// Per-parameter value domains, keyed deterministically.
pub type GridDomain = BTreeMap<String, Vec<ParamValue>>;

/// Search mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    #[default]
    Grid,
    Random,
}

/// Sweep execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub mode: SweepMode,
    /// Evaluation budget: grid traversal truncates here, random search draws
    /// exactly this many.
    pub max_evals: usize,
    /// Hard cap on the full grid size; a larger grid is rejected before any
    /// evaluation runs.
    pub grid_cap: usize,
    /// Seed for reproducible random draws.
    pub seed: u64,
    /// Dispatch evaluations across the rayon pool.
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mode: SweepMode::Grid,
            max_evals: 2_000,
            grid_cap: 100_000,
            seed: 12_345,
            parallel: true,
        }
    }
}

/// Errors that reject a sweep before it evaluates anything.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("grid size {size} exceeds the configured cap {cap}")]
    GridExplosion { size: usize, cap: usize },
    #[error("bad sweep token '{0}': use key=value, key=a,b, key=lo:hi:step, or key=*")]
    BadToken(String),
    #[error("bad range '{rhs}' for '{key}': use lo:hi:step with step != 0")]
    BadRange { key: String, rhs: String },
    #[error("param '{0}' has no min/max/step; cannot use '*' auto-grid")]
    AutoGridUnsupported(String),
    #[error("auto-grid '*' not supported for type {ty:?} of '{key}'")]
    AutoGridType { key: String, ty: ParamType },
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// One evaluated (parameters, metrics, score) tuple.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    /// Position in the original evaluation order; the ranking tie-break.
    pub eval_index: usize,
    pub run_id: String,
    pub params: ParamSet,
    pub metrics: Metrics,
    pub score: f64,
    /// Failure message for a worst-sentinel row.
    pub error: Option<String>,
}

/// Ranked sweep output: rows sorted by descending score, ties kept in
/// evaluation order.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub rows: Vec<SweepRow>,
    /// Full Cartesian size for grid mode, `None` for random.
    pub grid_size: Option<usize>,
    pub evaluated: usize,
}

impl SweepResult {
    pub fn best(&self) -> Option<&SweepRow> {
        self.rows.first()
    }
}

// ─── Grid construction ───────────────────────────────────────────────

fn frange(start: f64, stop: f64, step: f64) -> Vec<ParamValue> {
    let mut vals = Vec::new();
    let mut x = start;
    if step > 0.0 {
        while x <= stop + 1e-12 {
            vals.push(ParamValue::Float(x));
            x += step;
        }
    } else {
        while x >= stop - 1e-12 {
            vals.push(ParamValue::Float(x));
            x += step;
        }
    }
    vals
}

fn irange(start: i64, stop: i64, step: i64) -> Vec<ParamValue> {
    let mut vals = Vec::new();
    let mut x = start;
    if step > 0 {
        while x <= stop {
            vals.push(ParamValue::Int(x));
            x += step;
        }
    } else {
        while x >= stop {
            vals.push(ParamValue::Int(x));
            x += step;
        }
    }
    vals
}

fn auto_grid(spec: &ParamSpec) -> Result<Vec<ParamValue>, SweepError> {
    let (Some(min), Some(max), Some(step)) = (spec.min, spec.max, spec.step) else {
        return Err(SweepError::AutoGridUnsupported(spec.key.clone()));
    };
    match spec.ty {
        ParamType::Int => Ok(irange(min as i64, max as i64, (step as i64).max(1))),
        ParamType::Float => Ok(frange(min, max, step)),
        ty => Err(SweepError::AutoGridType {
            key: spec.key.clone(),
            ty,
        }),
    }
}

/// Parse sweep tokens into per-parameter domains.
///
/// Forms: `key=*` (auto grid from the spec), `key=a,b,c` (discrete set),
/// `key=lo:hi:step` (inclusive range), `key=value` (singleton).
pub fn parse_grid_tokens(
    tokens: &[String],
    schema: &[ParamSpec],
) -> Result<GridDomain, SweepError> {
    let mut grid = GridDomain::new();
    for token in tokens {
        let Some((key, rhs)) = token.split_once('=') else {
            return Err(SweepError::BadToken(token.clone()));
        };
        let key = key.trim();
        let rhs = rhs.trim();
        let spec = find_spec(schema, key)?;

        if rhs == "*" {
            grid.insert(key.to_string(), auto_grid(spec)?);
            continue;
        }

        if rhs.contains(',') && !rhs.contains(':') {
            let mut vals = Vec::new();
            for part in rhs.split(',').filter(|p| !p.trim().is_empty()) {
                vals.push(coerce(part, spec.ty)?);
            }
            grid.insert(key.to_string(), vals);
            continue;
        }

        if rhs.contains(':') {
            let parts: Vec<&str> = rhs.split(':').map(str::trim).collect();
            let bad = || SweepError::BadRange {
                key: key.to_string(),
                rhs: rhs.to_string(),
            };
            if parts.len() != 3 {
                return Err(bad());
            }
            let lo: f64 = parts[0].parse().map_err(|_| bad())?;
            let hi: f64 = parts[1].parse().map_err(|_| bad())?;
            let step: f64 = parts[2].parse().map_err(|_| bad())?;
            if step == 0.0 {
                return Err(bad());
            }
            let vals = match spec.ty {
                ParamType::Int => irange(lo as i64, hi as i64, step as i64),
                ParamType::Float => frange(lo, hi, step),
                _ => return Err(bad()),
            };
            grid.insert(key.to_string(), vals);
            continue;
        }

        grid.insert(key.to_string(), vec![coerce(rhs, spec.ty)?]);
    }
    Ok(grid)
}

/// Full Cartesian size of a grid (1 for the empty, defaults-only grid).
pub fn grid_size(grid: &GridDomain) -> usize {
    grid.values()
        .map(|vals| vals.len())
        .fold(1usize, |acc, n| acc.saturating_mul(n))
}

/// All grid assignments in deterministic order (keys sorted, values as
/// declared; last key varies fastest).
fn grid_param_sets(grid: &GridDomain, limit: usize) -> Vec<ParamSet> {
    let keys: Vec<&String> = grid.keys().collect();
    let domains: Vec<&Vec<ParamValue>> = grid.values().collect();
    let total = grid_size(grid);
    let count = total.min(limit);

    let mut sets = Vec::with_capacity(count);
    let mut indices = vec![0usize; keys.len()];
    for _ in 0..count {
        sets.push(
            keys.iter()
                .enumerate()
                .map(|(k, key)| ((*key).clone(), domains[k][indices[k]].clone()))
                .collect(),
        );
        // Odometer increment, last key fastest.
        for k in (0..indices.len()).rev() {
            indices[k] += 1;
            if indices[k] < domains[k].len() {
                break;
            }
            indices[k] = 0;
        }
    }
    sets
}

/// One random draw: grid domains are sampled, bounded specs draw uniformly,
/// everything else takes its default. No adaptive feedback between draws.
fn random_param_set(schema: &[ParamSpec], grid: &GridDomain, rng: &mut StdRng) -> ParamSet {
    schema
        .iter()
        .map(|spec| {
            let value = if let Some(domain) = grid.get(&spec.key) {
                domain[rng.gen_range(0..domain.len())].clone()
            } else {
                match (spec.ty, spec.min, spec.max) {
                    (ParamType::Int, Some(min), Some(max)) if min <= max => {
                        ParamValue::Int(rng.gen_range(min as i64..=max as i64))
                    }
                    (ParamType::Float, Some(min), Some(max)) if min < max => {
                        ParamValue::Float(rng.gen_range(min..max))
                    }
                    _ => spec.default.clone(),
                }
            };
            (spec.key.clone(), value)
        })
        .collect()
}

// ─── Evaluation ──────────────────────────────────────────────────────

fn evaluate_once(
    bars: &BarSeries,
    strategy: &dyn Strategy,
    overrides: &ParamSet,
    engine_cfg: &EngineConfig,
    objective: Objective,
) -> Result<(ParamSet, Metrics, f64), String> {
    let schema = strategy.params();
    let merged = merge_params(overrides, &schema).map_err(|e| e.to_string())?;
    let signals = strategy.run(bars, &merged);
    let result = run_backtest(bars, &signals, engine_cfg).map_err(|e| e.to_string())?;
    let metrics = Metrics::compute(engine_cfg.initial_equity, &result.equity_curve, &result.trades);
    let score = objective.score(&metrics);
    Ok((merged, metrics, score))
}

fn build_row(
    eval_index: usize,
    strategy_key: &str,
    overrides: ParamSet,
    engine_cfg: &EngineConfig,
    outcome: Result<(ParamSet, Metrics, f64), String>,
) -> SweepRow {
    match outcome {
        Ok((params, metrics, score)) => SweepRow {
            eval_index,
            run_id: run_id(strategy_key, &params, engine_cfg),
            params,
            metrics,
            score,
            error: None,
        },
        Err(message) => SweepRow {
            eval_index,
            run_id: run_id(strategy_key, &overrides, engine_cfg),
            params: overrides,
            metrics: Metrics::zero(),
            score: WORST_SCORE,
            error: Some(message),
        },
    }
}

/// Run a full sweep and rank the rows.
pub fn run_sweep(
    bars: &BarSeries,
    strategy: &dyn Strategy,
    grid_tokens: &[String],
    engine_cfg: &EngineConfig,
    objective: Objective,
    sweep_cfg: &SweepConfig,
) -> Result<SweepResult, SweepError> {
    let schema = strategy.params();
    let grid = parse_grid_tokens(grid_tokens, &schema)?;

    let (param_sets, full_grid) = match sweep_cfg.mode {
        SweepMode::Grid => {
            let size = grid_size(&grid);
            if size > sweep_cfg.grid_cap {
                return Err(SweepError::GridExplosion {
                    size,
                    cap: sweep_cfg.grid_cap,
                });
            }
            (grid_param_sets(&grid, sweep_cfg.max_evals), Some(size))
        }
        SweepMode::Random => {
            let mut rng = StdRng::seed_from_u64(sweep_cfg.seed);
            let draws = sweep_cfg.max_evals.max(1);
            (
                (0..draws)
                    .map(|_| random_param_set(&schema, &grid, &mut rng))
                    .collect::<Vec<_>>(),
                None,
            )
        }
    };

    debug!(
        strategy = strategy.key(),
        evals = param_sets.len(),
        grid_size = ?full_grid,
        "starting sweep"
    );

    let evaluate = |(i, overrides): (usize, &ParamSet)| -> SweepRow {
        let outcome = evaluate_once(bars, strategy, overrides, engine_cfg, objective);
        build_row(i, strategy.key(), overrides.clone(), engine_cfg, outcome)
    };

    // par_iter preserves input order on collect, so rows come back indexed by
    // evaluation order regardless of which worker finished first.
    let mut rows: Vec<SweepRow> = if sweep_cfg.parallel {
        param_sets.par_iter().enumerate().map(evaluate).collect()
    } else {
        param_sets.iter().enumerate().map(evaluate).collect()
    };

    let evaluated = rows.len();
    // Stable sort: equal scores keep ascending evaluation order.
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    Ok(SweepResult {
        rows,
        grid_size: full_grid,
        evaluated,
    })
}
