//! Event output for host integrations.
//!
//! The coordinator emits one JSONL event per settled operation so host
//! tooling (activity feeds, sync debuggers) can observe outline changes
//! without polling the store.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "wbs.event.v1";

/// Where events are written.
#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    /// Parse a destination string: `-` means stdout, anything else is a
    /// file path, empty/absent disables events.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// High-level event kinds emitted by the outline engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskIndented,
    TaskOutdented,
    TaskMovedUp,
    TaskMovedDown,
    TaskRepositioned,
    TaskInserted,
    TaskRemoved,
    OperationRejected,
    OperationFailed,
    ScheduleEdited,
    RollupApplied,
    UndoApplied,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event_id: String,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event: EventKind, actor: Option<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event_id: Ulid::new().to_string(),
            event,
            timestamp: Utc::now(),
            actor,
            data: None,
        }
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

#[derive(Debug)]
enum SinkOut {
    Stdout,
    File(std::fs::File),
    Buffer(String),
}

/// Event sink writing one JSON line per event.
#[derive(Debug)]
pub struct EventSink {
    out: SinkOut,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            out: SinkOut::Stdout,
        }
    }

    /// Emit events to a file, appending and creating as needed.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            out: SinkOut::File(file),
        })
    }

    /// Collect events in memory; read back with `drain_lines`.
    pub fn buffer() -> Self {
        Self {
            out: SinkOut::Buffer(String::new()),
        }
    }

    /// Write a single event as a JSON line.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_string(event)?;
        match &mut self.out {
            SinkOut::Stdout => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(serialized.as_bytes())?;
                handle.write_all(b"\n")?;
                handle.flush().map_err(Error::Io)?;
            }
            SinkOut::File(file) => {
                file.write_all(serialized.as_bytes())?;
                file.write_all(b"\n")?;
                file.flush().map_err(Error::Io)?;
            }
            SinkOut::Buffer(buffer) => {
                // writing to a String cannot fail
                let _ = writeln!(buffer, "{serialized}");
            }
        }
        Ok(())
    }

    /// Take the buffered JSON lines; empty for non-buffer sinks.
    pub fn drain_lines(&mut self) -> Vec<String> {
        match &mut self.out {
            SinkOut::Buffer(buffer) => {
                let lines = buffer.lines().map(str::to_string).collect();
                buffer.clear();
                lines
            }
            _ => Vec::new(),
        }
    }
}
