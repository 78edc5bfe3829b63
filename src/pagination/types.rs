//! Pagination types
//!
//! Defines the pagination mode configuration and the per-page request/result
//! values exchanged with the orchestrator.

use crate::error::{Error, Result};
use crate::types::{JsonValue, StringMap};
use serde::{Deserialize, Serialize};

// ============================================================================
// Pagination Mode
// ============================================================================

/// Pagination strategy, selected per stream in the source definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationMode {
    /// Single request, no pagination
    #[default]
    None,

    /// Keep fetching while the configured result-list key is non-empty.
    /// Matches sources with no total-count metadata.
    NonEmptyBody {
        /// Query parameter name for the page selector
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Optional page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size value sent with each request
        #[serde(default)]
        page_size: Option<u32>,
    },

    /// Keep fetching while `selector < ceil(total / page_size)`, with the
    /// total record count read from the response body.
    PageCount {
        /// Query parameter name for the page selector
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Fixed page size used in the page-count computation
        page_size: u32,
        /// Dot-notation path to the total record count
        #[serde(default = "default_total_path")]
        total_path: String,
        /// Optional page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_total_path() -> String {
    "total".to_string()
}

impl PaginationMode {
    /// Create a non-empty-body mode with defaults
    pub fn non_empty_body(page_param: impl Into<String>) -> Self {
        Self::NonEmptyBody {
            page_param: page_param.into(),
            page_size_param: None,
            page_size: None,
        }
    }

    /// Create a page-count mode with defaults
    pub fn page_count(page_param: impl Into<String>, page_size: u32) -> Self {
        Self::PageCount {
            page_param: page_param.into(),
            page_size,
            total_path: default_total_path(),
            page_size_param: None,
        }
    }

    /// Path to the total count, when this mode reads one
    pub fn total_path(&self) -> Option<&str> {
        match self {
            Self::PageCount { total_path, .. } => Some(total_path),
            _ => None,
        }
    }

    /// Reject configurations that cannot drive the state machine
    pub fn validate(&self, stream: &str) -> Result<()> {
        if let Self::PageCount { page_size, .. } = self {
            if *page_size == 0 {
                return Err(Error::invalid_value(
                    format!("streams.{stream}.pagination.page_size"),
                    "page size must be positive",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Page Request / Result
// ============================================================================

/// A pending page fetch: resolved URL, query parameters, page selector
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Fully resolved request URL (base + rendered path)
    pub url: String,
    /// Query parameters, selector included
    pub query: StringMap,
    /// The selector this request asks for
    pub selector: u32,
}

/// A parsed page response, discarded after processing
#[derive(Debug, Clone)]
pub struct PageResult {
    /// The selector that produced this page
    pub selector: u32,
    /// Records in parse order
    pub records: Vec<JsonValue>,
    /// Whether the records came from the configured result-list key
    /// (false for bare-list bodies and malformed shapes)
    pub from_records_key: bool,
    /// Total record count reported by the body, when the mode reads one
    pub total: Option<u64>,
}

impl PageResult {
    /// Parse a response body into records plus the continuation inputs
    /// the paginator needs.
    ///
    /// Object bodies yield the list under `records_key`; bare-list bodies
    /// are taken whole. Anything else parses as an empty page.
    pub fn parse(
        selector: u32,
        body: JsonValue,
        records_key: &str,
        mode: &PaginationMode,
    ) -> Self {
        match body {
            JsonValue::Array(records) => Self {
                selector,
                records,
                from_records_key: false,
                total: None,
            },
            JsonValue::Object(mut map) => {
                let total = mode
                    .total_path()
                    .and_then(|path| lookup(&map, path))
                    .and_then(as_count);
                let (records, from_records_key) = match map.remove(records_key) {
                    Some(JsonValue::Array(records)) => (records, true),
                    _ => (Vec::new(), false),
                };
                Self {
                    selector,
                    records,
                    from_records_key,
                    total,
                }
            }
            _ => Self {
                selector,
                records: Vec::new(),
                from_records_key: false,
                total: None,
            },
        }
    }

    /// Number of records in this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page carried no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Navigate a dot-notation path into an object
fn lookup<'a>(map: &'a serde_json::Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Read a count from a JSON number or numeric string
fn as_count(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}
