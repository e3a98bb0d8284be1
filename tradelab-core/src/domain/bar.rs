//! Bar — the fundamental market data unit — and the validated series that
//! feeds the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV observation for a time interval.
///
/// `volume` is optional: some feeds (FX, synthetic fixtures) carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    /// Basic OHLC sanity check: finite prices, high is the max, low is the min.
    pub fn is_sane(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }
}

/// Errors raised while validating input data. Any of these rejects the whole
/// run before the bar loop starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("empty bar series")]
    Empty,
    #[error("bar {index} at {time} is malformed (OHLC ordering or non-finite price)")]
    MalformedBar { index: usize, time: DateTime<Utc> },
    #[error("bar {index} time {time} does not strictly increase over its predecessor")]
    NonMonotonicTime { index: usize, time: DateTime<Utc> },
    #[error("signal at {time} does not match any bar time")]
    SignalTimeUnmatched { time: DateTime<Utc> },
    #[error("signals are not sorted by time (violation at {time})")]
    SignalsUnsorted { time: DateTime<Utc> },
}

/// A validated, time-sorted OHLCV sequence — the BarFeed contract holder.
///
/// Construction checks the whole series once; everything downstream
/// (engine, walk-forward slicing) can then index freely without re-checking.
/// Deserialization is deliberately not derived: external data enters through
/// [`BarSeries::new`] so the invariants cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap a bar sequence.
    ///
    /// Rejects empty input, malformed bars, and non-strictly-increasing
    /// (or duplicate) timestamps.
    pub fn new(bars: Vec<Bar>) -> Result<Self, InputError> {
        if bars.is_empty() {
            return Err(InputError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(InputError::MalformedBar {
                    index: i,
                    time: bar.time,
                });
            }
            if i > 0 && bar.time <= bars[i - 1].time {
                return Err(InputError::NonMonotonicTime {
                    index: i,
                    time: bar.time,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Index of the bar whose time matches exactly, if any.
    pub fn index_of_time(&self, time: DateTime<Utc>) -> Option<usize> {
        self.bars.binary_search_by_key(&time, |b| b.time).ok()
    }

    /// Sub-series over bar indexes `[start, end)`, clamped to the data.
    ///
    /// The slice inherits validity from the parent, so no re-validation runs.
    pub fn slice(&self, start: usize, end: usize) -> BarSeries {
        let end = end.min(self.bars.len());
        let start = start.min(end);
        BarSeries {
            bars: self.bars[start..end].to_vec(),
        }
    }
}
