//! The uniform strategy surface: a parameter schema plus a pure
//! bars × params → signals operation, selected through a registry.
//!
//! Strategies never see engine or portfolio state — the signature alone
//! keeps signal generation pure and look-ahead-free per call site.

use thiserror::Error;

use tradelab_core::domain::{BarSeries, Signal};

use crate::params::{ParamSet, ParamSpec};

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{key}'; known: {known:?}")]
    Unknown { key: String, known: Vec<String> },
}

/// Capability interface every strategy implements.
///
/// `run` receives a fully merged parameter assignment (defaults filled,
/// bounds validated) and returns time-ordered signals whose times match bars
/// in the input series.
pub trait Strategy: Send + Sync {
    fn key(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn params(&self) -> Vec<ParamSpec>;
    fn run(&self, bars: &BarSeries, params: &ParamSet) -> Vec<Signal>;
}

/// Keyed strategy lookup.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Registry with the built-in reference strategies.
    pub fn builtin() -> Self {
        Self {
            strategies: vec![
                Box::new(crate::strategies::SequentialReversal),
                Box::new(crate::strategies::SigmaExtreme),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    pub fn get(&self, key: &str) -> Result<&dyn Strategy, StrategyError> {
        let needle = key.trim().to_ascii_lowercase();
        self.strategies
            .iter()
            .map(|s| s.as_ref())
            .find(|s| s.key() == needle)
            .ok_or_else(|| StrategyError::Unknown {
                key: key.to_string(),
                known: self.strategies.iter().map(|s| s.key().to_string()).collect(),
            })
    }

    pub fn list(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }
}
