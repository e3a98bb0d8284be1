//! TradeLab Runner — metrics, objectives, parameter sweeps, walk-forward.
//!
//! This crate builds on `tradelab-core` to provide:
//! - Performance metrics over trades + equity curves
//! - Objective functions for ranking runs
//! - The typed parameter schema and the uniform strategy surface
//! - Grid/random parameter sweeps (rayon-parallel, deterministically ranked)
//! - The walk-forward out-of-sample harness with stability diagnostics
//! - CSV report writers and TOML run plans

pub mod fingerprint;
pub mod metrics;
pub mod objective;
pub mod optimize;
pub mod params;
pub mod plan;
pub mod report;
pub mod strategies;
pub mod strategy;
pub mod walkforward;

pub use fingerprint::run_id;
pub use metrics::{Metrics, PROFIT_FACTOR_PERFECT};
pub use objective::{Objective, WORST_SCORE};
pub use optimize::{
    grid_size, parse_grid_tokens, run_sweep, GridDomain, SweepConfig, SweepError, SweepMode,
    SweepResult, SweepRow,
};
pub use params::{
    coerce, merge_params, parse_kv_list, ParamError, ParamSet, ParamSpec, ParamType, ParamValue,
};
pub use plan::{PlanError, PlanOutcome, RunPlan};
pub use report::{
    write_oos_equity_csv, write_oos_equity_csv_file, write_sweep_csv, write_sweep_csv_file,
    write_windows_csv, write_windows_csv_file, ReportError,
};
pub use strategy::{Strategy, StrategyError, StrategyRegistry};
pub use walkforward::{
    create_windows, param_drift, run_walk_forward, OosPoint, WalkForwardConfig, WalkForwardError,
    WalkForwardResult, WindowResult, WindowSpec,
};
