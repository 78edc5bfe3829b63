//! Common types used throughout wellspring
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Child Sync Mode
// ============================================================================

/// How a child stream is driven from identifiers discovered by its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildSyncMode {
    /// One child sync per completed identifier batch, interleaved with the
    /// parent's pagination
    #[default]
    PerBatch,
    /// One child sync per identifier, run after the parent fully drains
    PerIdentifier,
}

// ============================================================================
// Timezone
// ============================================================================

/// Reporting timezone label accepted by the extraction window.
///
/// The upstream reporting API only understands this closed set, so the
/// label is an enum rather than a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    /// UTC+0
    #[default]
    Utc0,
    /// UTC+8
    Utc8,
    /// US Eastern
    Est,
}

impl Timezone {
    /// The label sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Timezone::Utc0 => "utc0",
            Timezone::Utc8 => "utc8",
            Timezone::Est => "est",
        }
    }

    /// Parse a label, returning `None` for anything outside the allowed set
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "utc0" => Some(Timezone::Utc0),
            "utc8" => Some(Timezone::Utc8),
            "est" => Some(Timezone::Est),
            _ => None,
        }
    }

    /// All accepted labels, for error messages
    pub fn allowed() -> &'static [&'static str] {
        &["utc0", "utc8", "est"]
    }
}

impl std::fmt::Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Level
// ============================================================================

/// Log level for emitted log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sync_mode_serde() {
        let mode: ChildSyncMode = serde_json::from_str("\"per_identifier\"").unwrap();
        assert_eq!(mode, ChildSyncMode::PerIdentifier);

        let json = serde_json::to_string(&ChildSyncMode::PerBatch).unwrap();
        assert_eq!(json, "\"per_batch\"");
    }

    #[test]
    fn test_child_sync_mode_default() {
        assert_eq!(ChildSyncMode::default(), ChildSyncMode::PerBatch);
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!(Timezone::parse("utc0"), Some(Timezone::Utc0));
        assert_eq!(Timezone::parse("utc8"), Some(Timezone::Utc8));
        assert_eq!(Timezone::parse("est"), Some(Timezone::Est));
        assert_eq!(Timezone::parse("pst"), None);
        assert_eq!(Timezone::parse("UTC0"), None);
    }

    #[test]
    fn test_timezone_serde() {
        let tz: Timezone = serde_json::from_str("\"utc8\"").unwrap();
        assert_eq!(tz, Timezone::Utc8);

        let json = serde_json::to_string(&Timezone::Est).unwrap();
        assert_eq!(json, "\"est\"");
    }

    #[test]
    fn test_timezone_display() {
        assert_eq!(Timezone::Utc0.to_string(), "utc0");
        assert_eq!(Timezone::default(), Timezone::Utc0);
    }

    #[test]
    fn test_backoff_default() {
        assert_eq!(BackoffType::default(), BackoffType::Exponential);
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some("".to_string()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
        assert_eq!("test".to_string().none_if_empty(), Some("test".to_string()));
        assert_eq!("".to_string().none_if_empty(), None);
    }
}
