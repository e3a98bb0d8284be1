//! The deterministic execution engine.

pub mod config;
pub mod run;

pub use config::{ConfigError, EngineConfig, PositionSizePolicy};
pub use run::{apply_slippage, run_backtest, EngineError, RunResult};
