//! TOML-backed run plans.
//!
//! A plan file captures everything needed to reproduce a sweep or a
//! walk-forward run: strategy key, grid tokens, engine configuration,
//! sweep settings, and (optionally) window geometry. Loading happens at the
//! pipeline boundary; nothing inside the bar loop touches a file.
//!
//! ```toml
//! strategy = "sigma_extreme"
//! objective = "balanced"
//! grid = ["window=10:60:10", "sigma=1.5,2.0,2.5"]
//!
//! [engine]
//! initial_equity = 100000.0
//! stop_loss_pct = 0.01
//!
//! [sweep]
//! mode = "grid"
//! max_evals = 500
//!
//! [walk_forward]
//! train_bars = 252
//! test_bars = 63
//! step_bars = 63
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradelab_core::domain::BarSeries;
use tradelab_core::engine::EngineConfig;

use crate::objective::Objective;
use crate::optimize::{run_sweep, SweepConfig, SweepResult};
use crate::strategy::StrategyRegistry;
use crate::walkforward::{run_walk_forward, WalkForwardConfig, WalkForwardResult};

/// Errors from plan loading.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse plan file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A reproducible sweep (and optional walk-forward) description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Registry key of the strategy to drive.
    pub strategy: String,
    #[serde(default)]
    pub objective: Objective,
    /// Sweep tokens, e.g. `window=10:60:5`.
    #[serde(default)]
    pub grid: Vec<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Present when the plan is a walk-forward run.
    #[serde(default)]
    pub walk_forward: Option<WalkForwardConfig>,
}

/// What executing a plan produced.
#[derive(Debug)]
pub enum PlanOutcome {
    Sweep(SweepResult),
    WalkForward(WalkForwardResult),
}

impl RunPlan {
    pub fn from_toml_str(src: &str) -> Result<Self, PlanError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Execute the plan against a bar series, resolving the strategy from
    /// the registry. Runs a walk-forward when window geometry is present,
    /// a plain sweep otherwise.
    pub fn execute(
        &self,
        bars: &BarSeries,
        registry: &StrategyRegistry,
    ) -> anyhow::Result<PlanOutcome> {
        let strategy = registry.get(&self.strategy)?;
        self.engine
            .validate()
            .context("engine configuration rejected")?;
        match &self.walk_forward {
            Some(wf) => {
                let result = run_walk_forward(
                    bars,
                    strategy,
                    &self.grid,
                    &self.engine,
                    self.objective,
                    &self.sweep,
                    wf,
                )
                .with_context(|| format!("walk-forward run for '{}' failed", self.strategy))?;
                Ok(PlanOutcome::WalkForward(result))
            }
            None => {
                let result = run_sweep(
                    bars,
                    strategy,
                    &self.grid,
                    &self.engine,
                    self.objective,
                    &self.sweep,
                )
                .with_context(|| format!("sweep for '{}' failed", self.strategy))?;
                Ok(PlanOutcome::Sweep(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::SweepMode;

    #[test]
    fn minimal_plan_uses_defaults() {
        let plan = RunPlan::from_toml_str("strategy = \"sigma_extreme\"").unwrap();
        assert_eq!(plan.strategy, "sigma_extreme");
        assert_eq!(plan.objective, Objective::Balanced);
        assert!(plan.grid.is_empty());
        assert_eq!(plan.engine, EngineConfig::default());
        assert!(plan.walk_forward.is_none());
    }

    #[test]
    fn full_plan_parses() {
        let src = r#"
            strategy = "sequential_reversal"
            objective = "profit_factor"
            grid = ["run_len=3:9:2"]

            [engine]
            initial_equity = 50000.0
            entry_latency_bars = 1

            [sweep]
            mode = "random"
            max_evals = 64
            seed = 99

            [walk_forward]
            train_bars = 120
            test_bars = 30
            step_bars = 30
        "#;
        let plan = RunPlan::from_toml_str(src).unwrap();
        assert_eq!(plan.objective, Objective::ProfitFactor);
        assert_eq!(plan.sweep.mode, SweepMode::Random);
        assert_eq!(plan.sweep.max_evals, 64);
        assert_eq!(plan.engine.initial_equity, 50_000.0);
        let wf = plan.walk_forward.unwrap();
        assert_eq!(wf.train_bars, 120);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            RunPlan::from_toml_str("strategy = "),
            Err(PlanError::Toml(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        std::fs::write(&path, "strategy = \"sigma_extreme\"\n").unwrap();
        let plan = RunPlan::load(&path).unwrap();
        assert_eq!(plan.strategy, "sigma_extreme");
    }

    #[test]
    fn execute_runs_a_sweep_for_plain_plans() {
        use chrono::{Duration, TimeZone, Utc};
        use tradelab_core::domain::Bar;

        let bars = BarSeries::new(
            (0..40)
                .map(|i| {
                    let close = 100.0 + (i as f64 * 0.9).sin() * 4.0;
                    Bar {
                        time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                            + Duration::days(i as i64),
                        open: close,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        volume: None,
                    }
                })
                .collect(),
        )
        .unwrap();

        let src = r#"
            strategy = "sequential_reversal"
            grid = ["run_len=2,3"]

            [engine]
            stop_loss_pct = 0.02
        "#;
        let plan = RunPlan::from_toml_str(src).unwrap();
        let outcome = plan
            .execute(&bars, &StrategyRegistry::builtin())
            .unwrap();
        match outcome {
            PlanOutcome::Sweep(result) => assert_eq!(result.evaluated, 2),
            PlanOutcome::WalkForward(_) => panic!("plain plan must run a sweep"),
        }
    }

    #[test]
    fn execute_rejects_unknown_strategy() {
        let bars = {
            use chrono::{TimeZone, Utc};
            use tradelab_core::domain::Bar;
            BarSeries::new(vec![Bar {
                time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: None,
            }])
            .unwrap()
        };
        let plan = RunPlan::from_toml_str("strategy = \"nope\"").unwrap();
        assert!(plan.execute(&bars, &StrategyRegistry::builtin()).is_err());
    }
}
