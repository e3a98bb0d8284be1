//! Deterministic event stream replay.
//!
//! Consumers never compute trades or equity themselves: they replay the
//! stream and render derived views. [`ReplayState`] is a pure function of the
//! event prefix read so far, which is exactly the reproducibility contract —
//! the same prefix always yields the same state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Event, FillAction, FillEvent};
use crate::domain::{Bar, ClosedTrade, EquityPoint, PositionSide, Signal};

/// Open-position view reconstructed purely from fill events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayPosition {
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
}

/// Derived state built by linearly replaying events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayState {
    pub bars: Vec<Bar>,
    pub signals: Vec<Signal>,
    pub fills: Vec<FillEvent>,
    pub trades: Vec<ClosedTrade>,
    pub equity: Vec<EquityPoint>,
    pub position: Option<ReplayPosition>,
}

impl ReplayState {
    /// Replay a full event sequence from scratch.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Apply one event. Matching is exhaustive over the closed event sum.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Bar(e) => self.bars.push(Bar {
                time: e.time,
                open: e.open,
                high: e.high,
                low: e.low,
                close: e.close,
                volume: e.volume,
            }),
            Event::Signal(e) => self.signals.push(Signal {
                time: e.time,
                side: e.side,
                price: e.price,
            }),
            Event::Fill(e) => {
                match e.action {
                    FillAction::Open | FillAction::Reverse => {
                        self.position = Some(ReplayPosition {
                            side: PositionSide::from(e.side),
                            quantity: e.quantity,
                            entry_price: e.price,
                            entry_time: e.time,
                        });
                    }
                    FillAction::Close => {
                        self.position = None;
                    }
                }
                self.fills.push(e.clone());
            }
            Event::TradeClosed(e) => self.trades.push(ClosedTrade {
                entry_time: e.entry_time,
                exit_time: e.time,
                side: e.side,
                entry_price: e.entry_price,
                exit_price: e.exit_price,
                quantity: e.quantity,
                pnl: e.pnl,
                pnl_pct: e.pnl_pct,
                reason: e.reason,
            }),
            Event::Equity(e) => self.equity.push(EquityPoint {
                time: e.time,
                equity: e.equity,
            }),
        }
    }

    /// Realized PnL summed over replayed trade closures.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn last_equity(&self) -> Option<f64> {
        self.equity.last().map(|p| p.equity)
    }
}

/// Stepping cursor over an in-memory event slice — seek/step playback for a
/// renderer, with derived state rebuilt from the head on demand.
#[derive(Debug)]
pub struct ReplayCursor<'a> {
    events: &'a [Event],
    index: usize,
}

impl<'a> ReplayCursor<'a> {
    pub fn new(events: &'a [Event]) -> Self {
        Self { events, index: 0 }
    }

    pub fn max_index(&self) -> usize {
        self.events.len().saturating_sub(1)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Clamp-seek to an absolute event index.
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.max_index());
    }

    /// Advance (or rewind, with negative `n`) by `n` events.
    pub fn step(&mut self, n: isize) {
        let next = self.index as isize + n;
        self.seek(next.max(0) as usize);
    }

    /// Events up to the cursor, inclusive.
    pub fn head(&self) -> &'a [Event] {
        if self.events.is_empty() {
            return self.events;
        }
        &self.events[..=self.index]
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.events.get(self.index).map(|e| e.time())
    }

    /// Derived state at the cursor: a pure function of the head prefix.
    pub fn state(&self) -> ReplayState {
        ReplayState::from_events(self.head())
    }
}
