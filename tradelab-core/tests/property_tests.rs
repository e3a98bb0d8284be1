//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over randomized bar series, signal sequences, and
//! configurations:
//! 1. Opening fills (OPEN/REVERSE) match TradeClosed events one-to-one
//! 2. The event log is time-monotonic with one Equity event per bar
//! 3. Equity identity — realized + marked unrealized — holds at every bar
//! 4. Replay of the emitted log reproduces the engine's trades and curve

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use tradelab_core::domain::{Bar, BarSeries, PositionSide, Side, Signal};
use tradelab_core::engine::{run_backtest, EngineConfig, PositionSizePolicy, RunResult};
use tradelab_core::events::replay::ReplayState;
use tradelab_core::events::{Event, FillAction};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random-walk bar series: every bar is sane and times strictly increase.
fn arb_bars(max_len: usize) -> impl Strategy<Value = BarSeries> {
    let step = (-0.03f64..0.03f64, 0.0f64..0.02f64, 0.0f64..0.02f64);
    proptest::collection::vec(step, 2..max_len).prop_map(|steps| {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut close = 100.0f64;
        let bars = steps
            .iter()
            .enumerate()
            .map(|(i, (drift, up, down))| {
                let open = close;
                close = (close * (1.0 + drift)).max(1.0);
                let high = open.max(close) * (1.0 + up);
                let low = (open.min(close) * (1.0 - down)).max(0.5);
                Bar {
                    time: t0 + Duration::days(i as i64),
                    open,
                    high,
                    low,
                    close,
                    volume: Some(1_000.0),
                }
            })
            .collect();
        BarSeries::new(bars).expect("generated bars must validate")
    })
}

/// Signals placed on a random subset of bars, priced at the bar close.
fn arb_signals(bars: &BarSeries) -> impl Strategy<Value = Vec<Signal>> {
    let times: Vec<_> = bars.iter().map(|b| (b.time, b.close)).collect();
    proptest::collection::vec(any::<bool>(), times.len()).prop_flat_map(move |mask| {
        let times = times.clone();
        proptest::collection::vec(any::<bool>(), times.len()).prop_map(move |sides| {
            times
                .iter()
                .zip(mask.iter())
                .zip(sides.iter())
                .filter(|((_, keep), _)| **keep)
                .map(|(((time, close), _), buy)| Signal {
                    time: *time,
                    side: if *buy { Side::Buy } else { Side::Sell },
                    price: *close,
                })
                .collect()
        })
    })
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (
        0u32..3,
        0u32..3,
        0.0f64..20.0,
        prop::bool::ANY,
        prop::option::of(0.005f64..0.05),
        prop::option::of(0.005f64..0.05),
        prop::option::of(0.005f64..0.05),
    )
        .prop_map(
            |(entry_lat, exit_lat, slip, allow_reverse, stop, take, trail)| EngineConfig {
                initial_equity: 100_000.0,
                position_size_policy: PositionSizePolicy::FixedQuantity { quantity: 10.0 },
                stop_loss_pct: stop,
                take_profit_pct: take,
                trailing_stop_pct: trail,
                allow_reverse,
                entry_slippage_bps: slip,
                exit_slippage_bps: slip,
                entry_latency_bars: entry_lat,
                exit_latency_bars: exit_lat,
            },
        )
}

fn arb_run() -> impl Strategy<Value = (BarSeries, Vec<Signal>, EngineConfig)> {
    arb_bars(40).prop_flat_map(|bars| {
        let signals = arb_signals(&bars);
        (Just(bars), signals, arb_config())
    })
}

fn opening_fill_count(result: &RunResult) -> usize {
    result
        .events
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::Fill(f) if matches!(f.action, FillAction::Open | FillAction::Reverse)
            )
        })
        .count()
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every position-opening fill has exactly one matching TradeClosed.
    #[test]
    fn opens_match_trade_closes((bars, signals, cfg) in arb_run()) {
        let result = run_backtest(&bars, &signals, &cfg).unwrap();
        prop_assert_eq!(opening_fill_count(&result), result.trades.len());
    }

    /// The log is time-monotonic and carries exactly one Equity per bar,
    /// after that bar's fills.
    #[test]
    fn log_is_monotonic_with_one_equity_per_bar((bars, signals, cfg) in arb_run()) {
        let result = run_backtest(&bars, &signals, &cfg).unwrap();

        for pair in result.events.windows(2) {
            prop_assert!(pair[0].time() <= pair[1].time());
        }

        let mut equity_seen_this_bar = true; // true until the first Bar
        let mut equity_count = 0usize;
        let mut bar_count = 0usize;
        for event in &result.events {
            match event {
                Event::Bar(_) => {
                    bar_count += 1;
                    equity_seen_this_bar = false;
                }
                Event::Equity(_) => {
                    equity_count += 1;
                    prop_assert!(!equity_seen_this_bar, "two equity events in one bar");
                    equity_seen_this_bar = true;
                }
                _ => {}
            }
        }
        prop_assert_eq!(bar_count, bars.len());
        prop_assert_eq!(equity_count, bars.len());
    }

    /// Equity identity: initial + realized-so-far + marked unrealized.
    #[test]
    fn equity_identity((bars, signals, cfg) in arb_run()) {
        let result = run_backtest(&bars, &signals, &cfg).unwrap();

        let mut realized = 0.0f64;
        let mut last_close = f64::NAN;
        let mut open: Option<(PositionSide, f64, f64)> = None;

        for event in &result.events {
            match event {
                Event::Bar(b) => last_close = b.close,
                Event::Fill(f) => match f.action {
                    FillAction::Open | FillAction::Reverse => {
                        open = Some((PositionSide::from(f.side), f.quantity, f.price));
                    }
                    FillAction::Close => open = None,
                },
                Event::TradeClosed(tc) => realized += tc.pnl,
                Event::Equity(eq) => {
                    let unrealized = open.map_or(0.0, |(side, qty, entry)| match side {
                        PositionSide::Long => (last_close - entry) * qty,
                        PositionSide::Short => (entry - last_close) * qty,
                    });
                    let expected = cfg.initial_equity + realized + unrealized;
                    prop_assert!((eq.equity - expected).abs() < 1e-6);
                }
                Event::Signal(_) => {}
            }
        }

        // End of data always flattens: the last equity point is fully realized.
        prop_assert!(open.is_none());
    }

    /// Linear replay of the emitted events reproduces the engine outputs.
    #[test]
    fn replay_reproduces_engine_outputs((bars, signals, cfg) in arb_run()) {
        let result = run_backtest(&bars, &signals, &cfg).unwrap();
        let state = ReplayState::from_events(&result.events);
        prop_assert_eq!(&state.trades, &result.trades);
        prop_assert_eq!(&state.equity, &result.equity_curve);
        prop_assert!(state.position.is_none());
    }
}
