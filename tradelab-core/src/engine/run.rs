//! The bar-by-bar execution state machine.
//!
//! One pass over the bar series turns a signal sequence into fills, closed
//! trades, an equity curve, and the typed event log. Per bar, the fixed order
//! is:
//!
//! 1. exit handling for an open position (pending exit fills, then stop-loss /
//!    take-profit / trailing-stop evaluation against this bar's range);
//! 2. signal application (pending entries whose delayed effective bar is this
//!    one, then signals stamped on this bar);
//! 3. emission in canonical intrabar order: Bar → Signal(s) → Fill(s) →
//!    TradeClosed(s) → Equity.
//!
//! Tie-break policy (fixed): when both the stop-loss and take-profit levels
//! lie inside one bar's high-low range, the stop-loss is assumed hit first —
//! the pessimistic resolution for the position. The trailing stop is only
//! consulted when neither fixed level fires, with the bar's extreme folded
//! into the trail reference first.
//!
//! Latency is bar-indexed: a signal with latency N fills at the open of the
//! Nth following bar in the series, regardless of wall-clock gaps. N = 0
//! fills same-bar at the order's reference price.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::domain::{
    Bar, BarSeries, ClosedTrade, EquityPoint, ExitReason, InputError, Position, PositionSide,
    Side, Signal,
};
use crate::events::{
    BarEvent, EquityEvent, Event, FillAction, FillEvent, SignalEvent, TradeClosedEvent,
};

use super::config::{ConfigError, EngineConfig};

/// Errors that abort a single run before or during execution.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input error: {0}")]
    Input(#[from] InputError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Everything one run produces. The event log is the contract; trades and
/// the equity curve are the same data in convenient form.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub events: Vec<Event>,
    /// Delayed fills dropped because their target bar lay past the horizon.
    pub dropped_fills: u32,
}

impl RunResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self, initial_equity: f64) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_equity)
    }
}

/// Adverse slippage: buys pay more, sells receive less.
pub fn apply_slippage(price: f64, action: Side, bps: f64) -> f64 {
    if bps <= 0.0 {
        return price;
    }
    let s = bps / 10_000.0;
    match action {
        Side::Buy => price * (1.0 + s),
        Side::Sell => price * (1.0 - s),
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    side: Side,
    intended_price: f64,
    submitted_time: DateTime<Utc>,
    latency_bars: u32,
    effective_bar: usize,
}

#[derive(Debug, Clone, Copy)]
enum ExitOrder {
    Close { reason: ExitReason },
    Reverse { side: Side },
}

#[derive(Debug, Clone, Copy)]
struct PendingExit {
    order: ExitOrder,
    intended_price: f64,
    submitted_time: DateTime<Utc>,
    latency_bars: u32,
    effective_bar: usize,
}

/// Per-bar event buffer, drained into canonical order at bar end.
#[derive(Default)]
struct BarBuffer {
    signals: Vec<SignalEvent>,
    fills: Vec<FillEvent>,
    trades: Vec<TradeClosedEvent>,
}

struct EngineState<'a> {
    cfg: &'a EngineConfig,
    /// Realized equity; unrealized PnL is marked on top at each bar close.
    equity: f64,
    position: Option<Position>,
    pending_entry: Option<PendingEntry>,
    pending_exit: Option<PendingExit>,
    trades: Vec<ClosedTrade>,
    dropped_fills: u32,
}

impl<'a> EngineState<'a> {
    fn new(cfg: &'a EngineConfig) -> Self {
        Self {
            cfg,
            equity: cfg.initial_equity,
            position: None,
            pending_entry: None,
            pending_exit: None,
            trades: Vec::new(),
            dropped_fills: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn open_position(
        &mut self,
        buf: &mut BarBuffer,
        time: DateTime<Utc>,
        side: Side,
        base_price: f64,
        intended_price: f64,
        latency_bars: u32,
        submitted_time: DateTime<Utc>,
        action: FillAction,
        reason: ExitReason,
    ) {
        let exec = apply_slippage(base_price, side, self.cfg.entry_slippage_bps);
        let stop_distance = self.cfg.stop_loss_pct.map(|p| p * exec);
        let quantity = self
            .cfg
            .position_size_policy
            .quantity(self.equity, exec, stop_distance);
        let pos_side = PositionSide::from(side);
        let sign = match pos_side {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        };
        self.position = Some(Position {
            side: pos_side,
            quantity,
            entry_price: exec,
            entry_time: time,
            stop: self.cfg.stop_loss_pct.map(|p| exec - sign * p * exec),
            take: self.cfg.take_profit_pct.map(|p| exec + sign * p * exec),
            trail_distance: self.cfg.trailing_stop_pct.map(|p| p * exec),
            best_price: exec,
        });
        buf.fills.push(FillEvent {
            time,
            action,
            side,
            price: exec,
            quantity,
            intended_price,
            slippage_bps: self.cfg.entry_slippage_bps,
            latency_bars,
            submitted_time,
            reason,
        });
    }

    /// Close the open position. `emit_fill` is false for the close leg of a
    /// reverse, which is recorded by the single REVERSE fill instead.
    #[allow(clippy::too_many_arguments)]
    fn close_position(
        &mut self,
        buf: &mut BarBuffer,
        time: DateTime<Utc>,
        base_price: f64,
        reason: ExitReason,
        latency_bars: u32,
        submitted_time: DateTime<Utc>,
        intended_price: f64,
        emit_fill: bool,
    ) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let exec = apply_slippage(base_price, pos.side.closing_action(), self.cfg.exit_slippage_bps);
        let pnl = pos.pnl_at(exec);
        self.equity += pnl;
        let notional = pos.entry_price * pos.quantity;
        let pnl_pct = if notional != 0.0 { pnl / notional } else { 0.0 };

        self.trades.push(ClosedTrade {
            entry_time: pos.entry_time,
            exit_time: time,
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price: exec,
            quantity: pos.quantity,
            pnl,
            pnl_pct,
            reason,
        });
        buf.trades.push(TradeClosedEvent {
            time,
            side: pos.side,
            entry_time: pos.entry_time,
            entry_price: pos.entry_price,
            exit_price: exec,
            quantity: pos.quantity,
            pnl,
            pnl_pct,
            reason,
        });
        if emit_fill {
            buf.fills.push(FillEvent {
                time,
                action: FillAction::Close,
                side: pos.side.opening_action(),
                price: exec,
                quantity: pos.quantity,
                intended_price,
                slippage_bps: self.cfg.exit_slippage_bps,
                latency_bars,
                submitted_time,
                reason,
            });
        }
    }

    /// Close the current position and immediately open the opposite one,
    /// recorded as one REVERSE fill. Both legs price off the same base.
    #[allow(clippy::too_many_arguments)]
    fn reverse_position(
        &mut self,
        buf: &mut BarBuffer,
        time: DateTime<Utc>,
        base_price: f64,
        intended_price: f64,
        latency_bars: u32,
        submitted_time: DateTime<Utc>,
        new_side: Side,
    ) {
        self.close_position(
            buf,
            time,
            base_price,
            ExitReason::Reverse,
            latency_bars,
            submitted_time,
            intended_price,
            false,
        );
        self.open_position(
            buf,
            time,
            new_side,
            base_price,
            intended_price,
            latency_bars,
            submitted_time,
            FillAction::Reverse,
            ExitReason::Reverse,
        );
    }

    /// Evaluate exit conditions against this bar's range for the open
    /// position. Returns the triggered reason and its intended fill level.
    fn evaluate_exits(&mut self, bar: &Bar) -> Option<(ExitReason, f64)> {
        let pos = self.position.as_mut()?;
        pos.update_extreme(bar);

        let (hit_stop, hit_take) = match pos.side {
            PositionSide::Long => (
                pos.stop.map(|s| bar.low <= s),
                pos.take.map(|t| bar.high >= t),
            ),
            PositionSide::Short => (
                pos.stop.map(|s| bar.high >= s),
                pos.take.map(|t| bar.low <= t),
            ),
        };

        // Pessimistic first: the stop wins when both levels are in range.
        if hit_stop == Some(true) {
            return Some((ExitReason::StopLoss, pos.stop.unwrap_or(bar.close)));
        }
        if hit_take == Some(true) {
            return Some((ExitReason::TakeProfit, pos.take.unwrap_or(bar.close)));
        }
        if let Some(level) = pos.trail_level() {
            let hit_trail = match pos.side {
                PositionSide::Long => bar.low <= level,
                PositionSide::Short => bar.high >= level,
            };
            if hit_trail {
                return Some((ExitReason::TrailingStop, level));
            }
        }
        None
    }

    fn apply_signal(&mut self, buf: &mut BarBuffer, bar_index: usize, bar: &Bar, signal: Signal) {
        match &self.position {
            None => {
                // An already-pending entry wins; later signals are ignored
                // until it fills.
                if self.pending_entry.is_some() {
                    return;
                }
                let latency = self.cfg.entry_latency_bars;
                if latency == 0 {
                    self.open_position(
                        buf,
                        bar.time,
                        signal.side,
                        signal.price,
                        signal.price,
                        0,
                        signal.time,
                        FillAction::Open,
                        ExitReason::Signal,
                    );
                } else {
                    self.pending_entry = Some(PendingEntry {
                        side: signal.side,
                        intended_price: signal.price,
                        submitted_time: signal.time,
                        latency_bars: latency,
                        effective_bar: bar_index + latency as usize,
                    });
                }
            }
            Some(pos) => {
                // Same-side signals and signals racing an in-flight exit are
                // ignored; an opposite signal reverses, or just closes when
                // reversing is disabled.
                let opposite = pos.side.opening_action() != signal.side;
                if !opposite || self.pending_exit.is_some() {
                    return;
                }
                let latency = self.cfg.exit_latency_bars;
                if self.cfg.allow_reverse {
                    if latency == 0 {
                        self.reverse_position(
                            buf,
                            bar.time,
                            signal.price,
                            signal.price,
                            0,
                            signal.time,
                            signal.side,
                        );
                    } else {
                        self.pending_exit = Some(PendingExit {
                            order: ExitOrder::Reverse { side: signal.side },
                            intended_price: signal.price,
                            submitted_time: signal.time,
                            latency_bars: latency,
                            effective_bar: bar_index + latency as usize,
                        });
                    }
                } else if latency == 0 {
                    self.close_position(
                        buf,
                        bar.time,
                        signal.price,
                        ExitReason::Signal,
                        0,
                        signal.time,
                        signal.price,
                        true,
                    );
                } else {
                    self.pending_exit = Some(PendingExit {
                        order: ExitOrder::Close {
                            reason: ExitReason::Signal,
                        },
                        intended_price: signal.price,
                        submitted_time: signal.time,
                        latency_bars: latency,
                        effective_bar: bar_index + latency as usize,
                    });
                }
            }
        }
    }
}

fn validate_signals(bars: &BarSeries, signals: &[Signal]) -> Result<(), InputError> {
    for pair in signals.windows(2) {
        if pair[1].time < pair[0].time {
            return Err(InputError::SignalsUnsorted { time: pair[1].time });
        }
    }
    for signal in signals {
        if bars.index_of_time(signal.time).is_none() {
            return Err(InputError::SignalTimeUnmatched { time: signal.time });
        }
    }
    Ok(())
}

/// Run one deterministic backtest: bars + signals + config in, trades +
/// equity curve + event log out.
pub fn run_backtest(
    bars: &BarSeries,
    signals: &[Signal],
    cfg: &EngineConfig,
) -> Result<RunResult, EngineError> {
    cfg.validate()?;
    validate_signals(bars, signals)?;

    let last_index = bars.len() - 1;
    let mut st = EngineState::new(cfg);
    let mut events: Vec<Event> = Vec::with_capacity(bars.len() * 2 + signals.len());
    let mut curve: Vec<EquityPoint> = Vec::with_capacity(bars.len());
    let mut sig_i = 0usize;

    for (i, bar) in bars.iter().enumerate() {
        let mut buf = BarBuffer::default();

        // ── 1. Exits ──
        if st.position.is_some() {
            if let Some(pending) = st.pending_exit {
                if pending.effective_bar <= i {
                    st.pending_exit = None;
                    let base = if pending.latency_bars > 0 {
                        bar.open
                    } else {
                        pending.intended_price
                    };
                    match pending.order {
                        ExitOrder::Close { reason } => st.close_position(
                            &mut buf,
                            bar.time,
                            base,
                            reason,
                            pending.latency_bars,
                            pending.submitted_time,
                            pending.intended_price,
                            true,
                        ),
                        ExitOrder::Reverse { side } => st.reverse_position(
                            &mut buf,
                            bar.time,
                            base,
                            pending.intended_price,
                            pending.latency_bars,
                            pending.submitted_time,
                            side,
                        ),
                    }
                }
            }
        }
        // A position opened on this bar gets its first exit check on the next
        // bar, whichever path opened it.
        let opened_this_bar = st
            .position
            .as_ref()
            .is_some_and(|p| p.entry_time == bar.time);
        if st.position.is_some() && !opened_this_bar && st.pending_exit.is_none() {
            if let Some((reason, level)) = st.evaluate_exits(bar) {
                let latency = cfg.exit_latency_bars;
                if latency == 0 {
                    st.close_position(
                        &mut buf, bar.time, level, reason, 0, bar.time, level, true,
                    );
                } else {
                    st.pending_exit = Some(PendingExit {
                        order: ExitOrder::Close { reason },
                        intended_price: level,
                        submitted_time: bar.time,
                        latency_bars: latency,
                        effective_bar: i + latency as usize,
                    });
                }
            }
        }

        // ── 2. Entries and signals ──
        if st.position.is_none() {
            if let Some(pending) = st.pending_entry {
                if pending.effective_bar <= i {
                    st.pending_entry = None;
                    let base = if pending.latency_bars > 0 {
                        bar.open
                    } else {
                        pending.intended_price
                    };
                    st.open_position(
                        &mut buf,
                        bar.time,
                        pending.side,
                        base,
                        pending.intended_price,
                        pending.latency_bars,
                        pending.submitted_time,
                        FillAction::Open,
                        ExitReason::Signal,
                    );
                }
            }
        }
        while sig_i < signals.len() && signals[sig_i].time <= bar.time {
            let signal = signals[sig_i];
            sig_i += 1;
            buf.signals.push(SignalEvent {
                time: signal.time,
                side: signal.side,
                price: signal.price,
                source: "strategy".to_string(),
            });
            st.apply_signal(&mut buf, i, bar, signal);
        }

        // ── End of data: realize everything on the final bar ──
        if i == last_index {
            if let Some(pending) = st.pending_entry.take() {
                st.dropped_fills += 1;
                warn!(
                    effective_bar = pending.effective_bar,
                    last_bar = last_index,
                    "dropping delayed entry past the data horizon"
                );
            }
            if st.position.is_some() {
                if let Some(pending) = st.pending_exit.take() {
                    st.dropped_fills += 1;
                    warn!(
                        effective_bar = pending.effective_bar,
                        last_bar = last_index,
                        "dropping delayed exit past the data horizon; forcing end-of-data close"
                    );
                }
                st.close_position(
                    &mut buf,
                    bar.time,
                    bar.close,
                    ExitReason::EndOfData,
                    0,
                    bar.time,
                    bar.close,
                    true,
                );
            }
        }

        // ── 3. Emission: Bar → Signal(s) → Fill(s) → TradeClosed(s) → Equity ──
        events.push(Event::Bar(BarEvent {
            time: bar.time,
            index: i as u64,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }));
        events.extend(buf.signals.drain(..).map(Event::Signal));
        events.extend(buf.fills.drain(..).map(Event::Fill));
        events.extend(buf.trades.drain(..).map(Event::TradeClosed));

        let marked = st.equity
            + st
                .position
                .as_ref()
                .map_or(0.0, |p| p.unrealized_pnl(bar.close));
        curve.push(EquityPoint {
            time: bar.time,
            equity: marked,
        });
        events.push(Event::Equity(EquityEvent {
            time: bar.time,
            equity: marked,
        }));
    }

    Ok(RunResult {
        trades: st.trades,
        equity_curve: curve,
        events,
        dropped_fills: st.dropped_fills,
    })
}
