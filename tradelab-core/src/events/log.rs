//! JSONL event log — one self-describing record per line.
//!
//! The writer appends and flushes per record so a consumer can begin
//! replaying a log while the run that produces it is still going. The reader
//! streams line by line and skips unknown event types (with a warning), so
//! logs written by newer engines stay replayable.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::{Event, WireError};

/// Errors from event log I/O.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("event log record error: {0}")]
    Wire(#[from] WireError),
}

/// Append-only JSONL writer.
pub struct EventLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLogWriter {
    /// Create (truncating any existing file) a log at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Open an existing log for appending.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Append one event and flush, so tailing consumers see it immediately.
    pub fn append(&mut self, event: &Event) -> Result<(), EventLogError> {
        let line = event.to_wire_json()?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Append a whole run's events in order.
    pub fn append_all<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<(), EventLogError> {
        for event in events {
            let line = event.to_wire_json()?;
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Streaming JSONL reader.
///
/// Blank lines are skipped. Records with an unknown `type` tag are skipped
/// with a warning instead of failing the replay — forward compatibility with
/// logs from newer engine versions.
pub struct EventLogReader {
    lines: Lines<BufReader<File>>,
}

impl EventLogReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }

    /// Read every event in the file into memory.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Event>, EventLogError> {
        Self::open(path)?.collect()
    }
}

impl Iterator for EventLogReader {
    type Item = Result<Event, EventLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Event::from_wire_json(trimmed) {
                Ok(event) => return Some(Ok(event)),
                Err(WireError::UnknownType(kind)) => {
                    warn!(kind, "skipping unknown event type in log");
                    continue;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EquityEvent;
    use chrono::TimeZone;

    fn equity_event(day: u32, equity: f64) -> Event {
        Event::Equity(EquityEvent {
            time: chrono::Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            equity,
        })
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        let events = vec![equity_event(2, 100.0), equity_event(3, 101.0)];
        let mut writer = EventLogWriter::create(&path).unwrap();
        writer.append_all(&events).unwrap();
        drop(writer);

        let back = EventLogReader::read_all(&path).unwrap();
        assert_eq!(back, events);
    }

    #[test]
    fn append_to_extends_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        EventLogWriter::create(&path)
            .unwrap()
            .append(&equity_event(2, 100.0))
            .unwrap();
        EventLogWriter::append_to(&path)
            .unwrap()
            .append(&equity_event(3, 101.0))
            .unwrap();

        let back = EventLogReader::read_all(&path).unwrap();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn reader_skips_blank_lines_and_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut raw = String::new();
        raw.push_str(&equity_event(2, 100.0).to_wire_json().unwrap());
        raw.push_str("\n\n");
        raw.push_str(r#"{"time":"2024-01-03T00:00:00Z","type":"dividend","payload":{"amount":1.0}}"#);
        raw.push('\n');
        raw.push_str(&equity_event(4, 102.0).to_wire_json().unwrap());
        raw.push('\n');
        std::fs::write(&path, raw).unwrap();

        let back = EventLogReader::read_all(&path).unwrap();
        assert_eq!(back, vec![equity_event(2, 100.0), equity_event(4, 102.0)]);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(EventLogReader::read_all(&path).is_err());
    }
}
