//! TradeLab Core — domain types, the deterministic execution engine, and the
//! typed event stream.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, signals, positions, closed trades)
//! - Single-position bar loop with stop-loss/take-profit/trailing-stop,
//!   latency, and slippage
//! - The append-only typed event stream and its JSONL wire format
//! - Pure event replay for downstream consumers
//!
//! Bar ingestion and signal generation live outside this crate: the engine
//! takes a validated [`domain::BarSeries`] and an ordered signal list and
//! produces fills, closed trades, an equity curve, and the event log.

pub mod domain;
pub mod engine;
pub mod events;

pub use domain::{
    Bar, BarSeries, ClosedTrade, EquityPoint, ExitReason, InputError, Position, PositionSide,
    Side, Signal,
};
pub use engine::{run_backtest, ConfigError, EngineConfig, EngineError, PositionSizePolicy, RunResult};
pub use events::{Event, FillAction};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a parallel sweep moves across worker
    /// threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<BarSeries>();
        require_sync::<BarSeries>();
        require_send::<Signal>();
        require_sync::<Signal>();
        require_send::<Position>();
        require_sync::<Position>();
        require_send::<ClosedTrade>();
        require_sync::<ClosedTrade>();
        require_send::<EquityPoint>();
        require_sync::<EquityPoint>();

        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<RunResult>();
        require_sync::<RunResult>();

        require_send::<Event>();
        require_sync::<Event>();
        require_send::<events::replay::ReplayState>();
        require_sync::<events::replay::ReplayState>();
    }
}
