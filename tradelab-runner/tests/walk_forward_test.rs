//! Walk-forward behavior end to end: temporal separation, per-window
//! diagnostics, and the chained out-of-sample equity series.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use tradelab_core::domain::{Bar, BarSeries, Side, Signal};
use tradelab_core::engine::{run_backtest, EngineConfig, PositionSizePolicy};
use tradelab_runner::params::{ParamSet, ParamSpec};
use tradelab_runner::strategy::Strategy;
use tradelab_runner::{
    run_walk_forward, Objective, SweepConfig, WalkForwardConfig, WalkForwardError,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn trending_series(n: usize) -> BarSeries {
    BarSeries::new(
        (0..n)
            .map(|i| {
                let close = 100.0 * (1.0_f64 + 0.002).powi(i as i32);
                let open = close * 0.999;
                Bar {
                    time: t0() + Duration::days(i as i64),
                    open,
                    high: close * 1.004,
                    low: open * 0.996,
                    close,
                    volume: Some(1_000.0),
                }
            })
            .collect(),
    )
    .unwrap()
}

fn flat_series(n: usize) -> BarSeries {
    BarSeries::new(
        (0..n)
            .map(|i| Bar {
                time: t0() + Duration::days(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: Some(1_000.0),
            })
            .collect(),
    )
    .unwrap()
}

fn engine_cfg() -> EngineConfig {
    EngineConfig {
        stop_loss_pct: None,
        take_profit_pct: None,
        position_size_policy: PositionSizePolicy::FixedQuantity { quantity: 10.0 },
        ..Default::default()
    }
}

/// Buys the first bar of whatever slice it is handed; the engine's
/// end-of-data close realizes the slice's full move.
struct BuyAndHold;

impl Strategy for BuyAndHold {
    fn key(&self) -> &'static str {
        "buy_and_hold"
    }
    fn name(&self) -> &'static str {
        "Buy and Hold"
    }
    fn description(&self) -> &'static str {
        "Long from the first bar of the slice."
    }
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::int("dummy", 1, "Dummy", 0.0, 10.0, 1.0)]
    }
    fn run(&self, bars: &BarSeries, _params: &ParamSet) -> Vec<Signal> {
        vec![Signal {
            time: bars.first().time,
            side: Side::Buy,
            price: bars.first().close,
        }]
    }
}

/// Records the (first, last) bar times of every slice it is asked to run on.
struct SpyStrategy {
    calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl SpyStrategy {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Strategy for SpyStrategy {
    fn key(&self) -> &'static str {
        "spy_strategy"
    }
    fn name(&self) -> &'static str {
        "Spy"
    }
    fn description(&self) -> &'static str {
        "Records the data span of every run call."
    }
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::int("dummy", 1, "Dummy", 0.0, 10.0, 1.0)]
    }
    fn run(&self, bars: &BarSeries, _params: &ParamSet) -> Vec<Signal> {
        self.calls
            .lock()
            .unwrap()
            .push((bars.first().time, bars.last().time));
        vec![Signal {
            time: bars.first().time,
            side: Side::Buy,
            price: bars.first().close,
        }]
    }
}

fn wf_cfg(train: usize, test: usize, step: usize) -> WalkForwardConfig {
    WalkForwardConfig {
        train_bars: train,
        test_bars: test,
        step_bars: step,
    }
}

fn singleton_sweep() -> SweepConfig {
    SweepConfig {
        parallel: false,
        ..Default::default()
    }
}

#[test]
fn optimizer_never_sees_test_bars_before_selection() {
    let bars = trending_series(200);
    let strategy = SpyStrategy::new();
    let cfg = wf_cfg(100, 25, 50);
    let result = run_walk_forward(
        &bars,
        &strategy,
        &[],
        &engine_cfg(),
        Objective::NetReturn,
        &singleton_sweep(),
        &cfg,
    )
    .unwrap();

    let calls = strategy.calls.lock().unwrap();
    // A singleton grid means one sweep run plus one test run per window, in
    // strict train-then-test order.
    assert_eq!(calls.len(), 2 * result.windows.len());
    for (w, pair) in result.windows.iter().zip(calls.chunks(2)) {
        let (train_first, train_last) = pair[0];
        let (test_first, test_last) = pair[1];
        assert_eq!(train_first, w.train_start_time);
        assert_eq!(train_last, w.train_end_time);
        assert_eq!(test_first, w.test_start_time);
        assert_eq!(test_last, w.test_end_time);
        assert!(
            train_last < test_first,
            "train span must end before the test span begins"
        );
    }
}

#[test]
fn window_results_carry_bounds_params_and_metrics() {
    let bars = trending_series(200);
    let result = run_walk_forward(
        &bars,
        &BuyAndHold,
        &[],
        &engine_cfg(),
        Objective::NetReturn,
        &singleton_sweep(),
        &wf_cfg(100, 25, 50),
    )
    .unwrap();

    // Candidates: floor((200-100)/50)+1 = 3; the third would test past bar
    // 200 and is dropped.
    assert_eq!(result.windows.len(), 2);
    for (i, w) in result.windows.iter().enumerate() {
        assert_eq!(w.window_id, i);
        assert!(w.best_params.contains_key("dummy"));
        assert!(w.train_metrics.trade_count > 0);
        assert!(w.test_metrics.trade_count > 0);
        // Uptrend: both sides profit.
        assert!(w.train_score > 0.0);
        assert!(w.test_score > 0.0);
        let decay = w.performance_decay.expect("train score is nonzero");
        assert!((decay - w.test_score / w.train_score).abs() < 1e-12);
    }
    // Identical winning params every window: drift is 0 after the first.
    assert_eq!(result.windows[0].param_drift, 0.0);
    assert!(result.windows[1..].iter().all(|w| w.param_drift == 0.0));
}

#[test]
fn oos_equity_chains_across_windows() {
    let bars = trending_series(200);
    let engine = engine_cfg();
    let cfg = wf_cfg(100, 25, 50);
    let result = run_walk_forward(
        &bars,
        &BuyAndHold,
        &[],
        &engine,
        Objective::NetReturn,
        &singleton_sweep(),
        &cfg,
    )
    .unwrap();

    // Expected chain: initial × Π (window_final / initial), computed by
    // running each test slice independently.
    let mut expected_final = engine.initial_equity;
    for w in &result.windows {
        let test = bars.slice(w.spec.test_start, w.spec.test_end);
        let signals = BuyAndHold.run(&test, &w.best_params);
        let run = run_backtest(&test, &signals, &engine).unwrap();
        expected_final *= run.final_equity(engine.initial_equity) / engine.initial_equity;
    }
    let chained_final = result.oos_equity.last().unwrap().equity;
    assert!(
        (chained_final - expected_final).abs() < 1e-6,
        "chained {chained_final} vs expected {expected_final}"
    );

    // Each window's points carry its id and times stay monotonic overall.
    for pair in result.oos_equity.windows(2) {
        assert!(pair[0].time < pair[1].time);
        assert!(pair[0].window_id <= pair[1].window_id);
    }
    let test_bars_total: usize = result.windows.iter().map(|_| cfg.test_bars).sum();
    assert_eq!(result.oos_equity.len(), test_bars_total);
}

#[test]
fn flat_market_yields_zero_train_score_and_null_decay() {
    let bars = flat_series(200);
    let result = run_walk_forward(
        &bars,
        &BuyAndHold,
        &[],
        &engine_cfg(),
        Objective::NetReturn,
        &singleton_sweep(),
        &wf_cfg(100, 25, 50),
    )
    .unwrap();

    for w in &result.windows {
        // One trade per slice at identical prices: net return exactly zero.
        assert_eq!(w.train_score, 0.0);
        assert!(
            w.performance_decay.is_none(),
            "decay must be undefined when the train score is zero"
        );
    }
}

#[test]
fn insufficient_data_is_rejected_up_front() {
    let bars = trending_series(50);
    let err = run_walk_forward(
        &bars,
        &BuyAndHold,
        &[],
        &engine_cfg(),
        Objective::NetReturn,
        &singleton_sweep(),
        &wf_cfg(100, 25, 50),
    )
    .unwrap_err();
    assert!(matches!(err, WalkForwardError::InsufficientData { .. }));
}
