//! CSV report writers for sweep and walk-forward outputs.
//!
//! Three tables, written at the pipeline boundary:
//! - the ranked sweep table (one row per evaluation, `param_*` columns);
//! - the per-window walk-forward table (bounds, metrics, serialized best
//!   parameters, drift, decay);
//! - the concatenated out-of-sample equity table.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::optimize::SweepResult;
use crate::walkforward::{OosPoint, WindowResult};

/// Errors from report writing.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_f64(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".into() } else { "-inf".into() }
    } else {
        format!("{value}")
    }
}

/// Write the ranked sweep table. Rows arrive already sorted by descending
/// score; parameters spread into one `param_<key>` column each.
pub fn write_sweep_csv<W: Write>(result: &SweepResult, out: W) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);

    let param_keys: BTreeSet<&String> =
        result.rows.iter().flat_map(|r| r.params.keys()).collect();

    let mut header = vec![
        "rank".to_string(),
        "eval_index".to_string(),
        "run_id".to_string(),
        "score".to_string(),
        "net_return_pct".to_string(),
        "max_drawdown_pct".to_string(),
        "profit_factor".to_string(),
        "win_rate".to_string(),
        "trade_count".to_string(),
        "avg_trade_duration_secs".to_string(),
        "error".to_string(),
    ];
    header.extend(param_keys.iter().map(|k| format!("param_{k}")));
    writer.write_record(&header)?;

    for (rank, row) in result.rows.iter().enumerate() {
        let mut record = vec![
            rank.to_string(),
            row.eval_index.to_string(),
            row.run_id.clone(),
            fmt_f64(row.score),
            fmt_f64(row.metrics.net_return_pct),
            fmt_f64(row.metrics.max_drawdown_pct),
            fmt_f64(row.metrics.profit_factor),
            fmt_f64(row.metrics.win_rate),
            row.metrics.trade_count.to_string(),
            fmt_f64(row.metrics.avg_trade_duration_secs),
            row.error.clone().unwrap_or_default(),
        ];
        for key in &param_keys {
            record.push(
                row.params
                    .get(*key)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-window walk-forward table. Best parameters serialize as one
/// JSON column so the table stays rectangular across windows.
pub fn write_windows_csv<W: Write>(windows: &[WindowResult], out: W) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "window_id",
        "train_start",
        "train_end",
        "test_start",
        "test_end",
        "best_params_json",
        "train_score",
        "test_score",
        "train_net_return_pct",
        "train_max_drawdown_pct",
        "train_profit_factor",
        "train_win_rate",
        "train_trade_count",
        "test_net_return_pct",
        "test_max_drawdown_pct",
        "test_profit_factor",
        "test_win_rate",
        "test_trade_count",
        "param_drift",
        "performance_decay",
    ])?;

    for w in windows {
        writer.write_record([
            w.window_id.to_string(),
            w.train_start_time.to_rfc3339(),
            w.train_end_time.to_rfc3339(),
            w.test_start_time.to_rfc3339(),
            w.test_end_time.to_rfc3339(),
            serde_json::to_string(&w.best_params)?,
            fmt_f64(w.train_score),
            fmt_f64(w.test_score),
            fmt_f64(w.train_metrics.net_return_pct),
            fmt_f64(w.train_metrics.max_drawdown_pct),
            fmt_f64(w.train_metrics.profit_factor),
            fmt_f64(w.train_metrics.win_rate),
            w.train_metrics.trade_count.to_string(),
            fmt_f64(w.test_metrics.net_return_pct),
            fmt_f64(w.test_metrics.max_drawdown_pct),
            fmt_f64(w.test_metrics.profit_factor),
            fmt_f64(w.test_metrics.win_rate),
            w.test_metrics.trade_count.to_string(),
            fmt_f64(w.param_drift),
            w.performance_decay.map(fmt_f64).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the concatenated out-of-sample equity series.
pub fn write_oos_equity_csv<W: Write>(points: &[OosPoint], out: W) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["window_id", "time", "equity"])?;
    for p in points {
        writer.write_record([
            p.window_id.to_string(),
            p.time.to_rfc3339(),
            fmt_f64(p.equity),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Convenience path-based variants.
pub fn write_sweep_csv_file(result: &SweepResult, path: impl AsRef<Path>) -> Result<(), ReportError> {
    write_sweep_csv(result, std::fs::File::create(path)?)
}

pub fn write_windows_csv_file(
    windows: &[WindowResult],
    path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    write_windows_csv(windows, std::fs::File::create(path)?)
}

pub fn write_oos_equity_csv_file(
    points: &[OosPoint],
    path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    write_oos_equity_csv(points, std::fs::File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::optimize::SweepRow;
    use crate::params::{ParamSet, ParamValue};
    use chrono::{TimeZone, Utc};

    fn sample_result() -> SweepResult {
        let params = ParamSet::from([("window".to_string(), ParamValue::Int(20))]);
        SweepResult {
            rows: vec![SweepRow {
                eval_index: 0,
                run_id: "abc123".into(),
                params,
                metrics: Metrics {
                    net_return_pct: 0.12,
                    max_drawdown_pct: 0.05,
                    profit_factor: f64::INFINITY,
                    win_rate: 0.6,
                    trade_count: 10,
                    avg_trade_duration_secs: 86_400.0,
                },
                score: 0.095,
                error: None,
            }],
            grid_size: Some(1),
            evaluated: 1,
        }
    }

    #[test]
    fn sweep_csv_has_param_columns_and_finite_text() {
        let mut out = Vec::new();
        write_sweep_csv(&sample_result(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.ends_with("param_window"));
        let row = lines.next().unwrap();
        assert!(row.contains("inf"));
        assert!(row.ends_with("20"));
    }

    #[test]
    fn oos_csv_shape() {
        let points = vec![OosPoint {
            window_id: 0,
            time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            equity: 100_500.0,
        }];
        let mut out = Vec::new();
        write_oos_equity_csv(&points, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("window_id,time,equity"));
        assert!(text.contains("100500"));
    }
}
