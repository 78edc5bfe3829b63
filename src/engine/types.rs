//! Engine types
//!
//! Messages emitted during a sync, per-run statistics, and the per-stream
//! outcome report returned by `sync_all`.

use crate::types::{JsonValue, LogLevel};
use serde::Serialize;

/// A message emitted during sync
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// A single extracted record
    Record {
        /// Stream name
        stream: String,
        /// The record payload
        record: JsonValue,
    },
    /// State update
    State {
        /// Stream name
        stream: String,
        /// State data (checkpoint, partition info)
        data: JsonValue,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, record: JsonValue) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: JsonValue) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a debug log
    pub fn debug(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Debug, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Top-level streams completed
    pub streams_synced: usize,
    /// Child-sync invocations (batch or per-identifier)
    pub child_syncs: usize,
    /// Streams that ended in a fatal error
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a completed stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a child-sync invocation
    pub fn add_child_sync(&mut self) {
        self.child_syncs += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Outcome of one top-level stream within a run
#[derive(Debug, Clone, Serialize)]
pub struct StreamOutcome {
    /// Stream name
    pub stream: String,
    /// Records emitted by this stream's tree (children included)
    pub records: usize,
    /// Pages fetched by this stream's tree
    pub pages: usize,
    /// Fatal error, when the stream did not complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamOutcome {
    /// Whether the stream completed without a fatal error
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Full report from a `sync_all` run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Per-stream outcomes in sync order
    pub outcomes: Vec<StreamOutcome>,
    /// All messages emitted during the run
    pub messages: Vec<Message>,
    /// Accumulated statistics
    pub stats: SyncStats,
}

impl SyncReport {
    /// Whether every stream completed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(StreamOutcome::is_ok)
    }

    /// Streams that ended in a fatal error
    pub fn failures(&self) -> impl Iterator<Item = &StreamOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}
