//! The typed, append-only event stream — the reproducibility boundary.
//!
//! Every run emits an ordered sequence of five event kinds. The stream is the
//! sole contract downstream consumers rely on: identical log, identical
//! derived state, regardless of engine version. Consumers reconstruct
//! position/equity/trade state by linear replay (see [`replay`]) and never
//! read engine internals.
//!
//! Ordering contract: events are time-monotonic, and within one bar the
//! causal order is Bar → Signal(s) → Fill(s) → TradeClosed(s) → Equity, with
//! exactly one Equity event per bar, strictly after that bar's fills.

pub mod log;
pub mod replay;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ExitReason, PositionSide, Side};

/// What a fill did to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillAction {
    /// Established a new position from flat.
    Open,
    /// Closed the open position back to flat.
    Close,
    /// Closed the open position and immediately opened the opposite one.
    Reverse,
}

/// One OHLCV bar as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub time: DateTime<Utc>,
    pub index: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// A strategy signal as it entered the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub time: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    pub source: String,
}

/// The executed effect of an order on the position, after latency and
/// slippage.
///
/// `side` is the direction of the position the fill leaves in place: the
/// side being opened for `Open`/`Reverse`, the side being closed for `Close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub time: DateTime<Utc>,
    pub action: FillAction,
    pub side: Side,
    /// Executed price used by PnL.
    pub price: f64,
    pub quantity: f64,
    /// Pre-slippage target price.
    pub intended_price: f64,
    /// Basis points applied to the intended/base price.
    pub slippage_bps: f64,
    /// Bars the order waited before filling.
    pub latency_bars: u32,
    /// When the order was submitted/triggered.
    pub submitted_time: DateTime<Utc>,
    /// Cause of the fill (SIGNAL for plain entries, the exit reason otherwise).
    pub reason: ExitReason,
}

/// A completed round-trip, emitted at the moment of the closing fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeClosedEvent {
    pub time: DateTime<Utc>,
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub reason: ExitReason,
}

/// End-of-bar equity snapshot: realized plus mark-to-market unrealized PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityEvent {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// The closed sum of everything a run can emit. Consumers match exhaustively;
/// a new variant is a deliberate, visible contract change.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Bar(BarEvent),
    Signal(SignalEvent),
    Fill(FillEvent),
    TradeClosed(TradeClosedEvent),
    Equity(EquityEvent),
}

impl Event {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Event::Bar(e) => e.time,
            Event::Signal(e) => e.time,
            Event::Fill(e) => e.time,
            Event::TradeClosed(e) => e.time,
            Event::Equity(e) => e.time,
        }
    }

    /// Wire type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Bar(_) => "bar",
            Event::Signal(_) => "signal",
            Event::Fill(_) => "fill",
            Event::TradeClosed(_) => "trade_closed",
            Event::Equity(_) => "equity",
        }
    }
}

/// Errors from wire encoding/decoding.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("event payload is not a JSON object")]
    PayloadNotObject,
    #[error("unknown event type '{0}'")]
    UnknownType(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One self-describing wire record: `{ time, type, payload }`.
///
/// `payload` is a flat mapping of the event's named primitive fields. Readers
/// tolerate unknown extra payload fields, so fields can be added without
/// breaking older consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Event {
    /// Encode into the `{time, type, payload}` wire shape. The `time` field
    /// is hoisted out of the payload.
    pub fn to_wire(&self) -> Result<WireRecord, WireError> {
        let mut value = match self {
            Event::Bar(e) => serde_json::to_value(e)?,
            Event::Signal(e) => serde_json::to_value(e)?,
            Event::Fill(e) => serde_json::to_value(e)?,
            Event::TradeClosed(e) => serde_json::to_value(e)?,
            Event::Equity(e) => serde_json::to_value(e)?,
        };
        let obj = value.as_object_mut().ok_or(WireError::PayloadNotObject)?;
        obj.remove("time");
        Ok(WireRecord {
            time: self.time(),
            kind: self.kind().to_string(),
            payload: value,
        })
    }

    /// Decode a wire record back into a typed event.
    ///
    /// Unknown payload fields are ignored; an unknown `type` tag is an error
    /// the caller may choose to skip (see [`log::EventLogReader`]).
    pub fn from_wire(record: &WireRecord) -> Result<Event, WireError> {
        let mut payload = record.payload.clone();
        let obj = payload.as_object_mut().ok_or(WireError::PayloadNotObject)?;
        obj.insert("time".into(), serde_json::to_value(record.time)?);
        let event = match record.kind.as_str() {
            "bar" => Event::Bar(serde_json::from_value(payload)?),
            "signal" => Event::Signal(serde_json::from_value(payload)?),
            "fill" => Event::Fill(serde_json::from_value(payload)?),
            "trade_closed" => Event::TradeClosed(serde_json::from_value(payload)?),
            "equity" => Event::Equity(serde_json::from_value(payload)?),
            other => return Err(WireError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    /// Encode as one JSONL line.
    pub fn to_wire_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(&self.to_wire()?)?)
    }

    /// Decode one JSONL line.
    pub fn from_wire_json(line: &str) -> Result<Event, WireError> {
        let record: WireRecord = serde_json::from_str(line)?;
        Event::from_wire(&record)
    }
}
