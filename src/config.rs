//! Configuration types for source definitions
//!
//! This module contains the structures describing a source in YAML (base URL,
//! auth endpoint, HTTP tuning, stream table) and the runtime configuration
//! (credential secret plus extraction window) supplied as JSON.

use crate::error::{Error, Result};
use crate::pagination::PaginationMode;
use crate::template;
use crate::types::{BackoffType, ChildSyncMode, JsonObject, JsonValue, Timezone};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ============================================================================
// Top-Level Source Definition
// ============================================================================

/// Complete source definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Kind of definition (always "source")
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Definition version
    #[serde(default = "default_version")]
    pub version: String,

    /// Source metadata
    pub metadata: SourceMetadata,

    /// Base URL for API requests
    pub base_url: String,

    /// Authentication endpoint configuration
    pub auth: AuthDef,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Default request settings
    #[serde(default)]
    pub request_defaults: RequestDefaults,

    /// Stream definitions
    #[serde(default)]
    pub streams: Vec<StreamDescriptor>,
}

fn default_kind() -> String {
    "source".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

impl SourceDefinition {
    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Streams declaring `name` as their parent, in declared order
    pub fn children_of(&self, name: &str) -> Vec<&StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.parent.as_ref().is_some_and(|p| p.stream == name))
            .collect()
    }

    /// Validate the definition before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        if self.auth.endpoint.is_empty() {
            return Err(Error::missing_field("auth.endpoint"));
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.name.as_str()) {
                return Err(Error::invalid_value(
                    "streams",
                    format!("duplicate stream name '{}'", stream.name),
                ));
            }
        }

        for stream in &self.streams {
            stream.validate()?;

            if let Some(parent) = &stream.parent {
                if self.stream(&parent.stream).is_none() {
                    return Err(Error::invalid_value(
                        format!("streams.{}.parent", stream.name),
                        format!("unknown parent stream '{}'", parent.stream),
                    ));
                }
            }

            // Parent chains must terminate
            let mut hops = 0;
            let mut current = stream;
            while let Some(parent) = &current.parent {
                hops += 1;
                if hops > self.streams.len() {
                    return Err(Error::invalid_value(
                        format!("streams.{}.parent", stream.name),
                        "parent references form a cycle",
                    ));
                }
                match self.stream(&parent.stream) {
                    Some(next) => current = next,
                    None => break,
                }
            }

            // The context namespace only exists for child streams
            if stream.parent.is_none() {
                for source in std::iter::once(&stream.path).chain(stream.params.values()) {
                    for var in template::extract_variables(source) {
                        if var == "context" || var.starts_with("context.") {
                            return Err(Error::invalid_value(
                                format!("streams.{}", stream.name),
                                format!("'{{{{ {var} }}}}' used outside a child stream"),
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Source metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Unique source name (e.g., "mediago")
    pub name: String,

    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,

    /// Description of the source
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication endpoint configuration.
///
/// The credential secret itself arrives in the runtime config, never in the
/// definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthDef {
    /// Path (or absolute URL) of the token-exchange endpoint
    pub endpoint: String,

    /// Dot-notation field holding the token in the exchange response
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

fn default_token_path() -> String {
    "access_token".to_string()
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Attempt ceiling per request (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    8
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
        }
    }
}

fn default_rps() -> f64 {
    10.0
}

/// Default request settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestDefaults {
    /// Default headers for all requests
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Default query parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

// ============================================================================
// Stream Descriptor
// ============================================================================

/// Immutable per-stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Unique stream name
    pub name: String,

    /// Request path template (may reference `{{ config.* }}` and, for child
    /// streams, `{{ context.* }}`)
    pub path: String,

    /// Primary key fields (non-empty)
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Replication key field for incremental extraction
    #[serde(default)]
    pub replication_key: Option<String>,

    /// Query parameter carrying the seeded replication filter
    #[serde(default = "default_replication_param")]
    pub replication_param: String,

    /// Top-level response key holding the record list
    #[serde(default = "default_records_key")]
    pub records_key: String,

    /// Source-declared ordering by replication key
    #[serde(default)]
    pub is_sorted: bool,

    /// Pagination mode
    #[serde(default)]
    pub pagination: PaginationMode,

    /// Parent stream reference (makes this a child stream)
    #[serde(default)]
    pub parent: Option<ParentLink>,

    /// How this stream is invoked from its parent
    #[serde(default)]
    pub child_sync: ChildSyncMode,

    /// Identifier batch capacity for `per_batch` child sync
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Persist one checkpoint per parent context (child streams only)
    #[serde(default)]
    pub partitioned_state: bool,

    /// Static query parameters (template values allowed)
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Additional headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_replication_param() -> String {
    "start_date".to_string()
}

fn default_records_key() -> String {
    "results".to_string()
}

fn default_batch_size() -> usize {
    150
}

impl StreamDescriptor {
    /// Whether this stream runs only via a parent
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::missing_field("streams.name"));
        }
        if self.path.is_empty() {
            return Err(Error::missing_field(format!("streams.{}.path", self.name)));
        }
        if self.primary_key.is_empty() {
            return Err(Error::invalid_value(
                format!("streams.{}.primary_key", self.name),
                "at least one primary key field is required",
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_value(
                format!("streams.{}.batch_size", self.name),
                "batch size must be positive",
            ));
        }
        self.pagination.validate(&self.name)?;
        if self.is_sorted && self.replication_key.is_none() {
            return Err(Error::invalid_value(
                format!("streams.{}.is_sorted", self.name),
                "is_sorted requires a replication_key",
            ));
        }
        if self.partitioned_state && (self.parent.is_none() || self.replication_key.is_none()) {
            return Err(Error::invalid_value(
                format!("streams.{}.partitioned_state", self.name),
                "partitioned state requires a parent and a replication_key",
            ));
        }
        if let Some(parent) = &self.parent {
            if parent.stream == self.name {
                return Err(Error::invalid_value(
                    format!("streams.{}.parent", self.name),
                    "a stream cannot be its own parent",
                ));
            }
            if parent.key_field.is_empty() {
                return Err(Error::missing_field(format!(
                    "streams.{}.parent.key_field",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Reference from a child stream to its parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentLink {
    /// Parent stream name
    pub stream: String,

    /// Parent-record field supplying the child identifier
    pub key_field: String,

    /// Query parameter carrying the comma-joined identifier batch; when
    /// absent the child's path template consumes `{{ context.id }}`
    #[serde(default)]
    pub context_param: Option<String>,
}

// ============================================================================
// Runtime Config
// ============================================================================

/// Extraction window resolved from the runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractWindow {
    /// Inclusive lower bound for replication filters
    pub start_date: NaiveDate,
    /// Inclusive upper bound
    pub end_date: NaiveDate,
    /// Reporting timezone label
    pub timezone: Timezone,
}

/// Runtime configuration: credential secret plus extraction window
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Pre-shared secret for the token exchange
    pub api_token: String,

    /// Extraction window
    pub window: ExtractWindow,

    raw: JsonObject,
}

impl ExtractConfig {
    /// Parse and validate a runtime config document
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let obj = match value {
            JsonValue::Object(obj) => obj,
            _ => return Err(Error::config("runtime config must be a JSON object")),
        };

        let api_token = match obj.get("api_token").and_then(JsonValue::as_str) {
            Some(token) if !token.is_empty() => token.to_string(),
            Some(_) => {
                return Err(Error::invalid_value("api_token", "must not be empty"));
            }
            None => return Err(Error::missing_field("api_token")),
        };

        let start_date = match obj.get("start_date").and_then(JsonValue::as_str) {
            Some(raw) => parse_date("start_date", raw)?,
            None => return Err(Error::missing_field("start_date")),
        };

        let end_date = match obj.get("end_date").and_then(JsonValue::as_str) {
            Some(raw) => parse_date("end_date", raw)?,
            None => Utc::now().date_naive(),
        };

        let timezone = match obj.get("timezone") {
            None | Some(JsonValue::Null) => Timezone::default(),
            Some(JsonValue::String(label)) => Timezone::parse(label).ok_or_else(|| {
                Error::invalid_value(
                    "timezone",
                    format!("'{label}' is not one of {:?}", Timezone::allowed()),
                )
            })?,
            Some(_) => {
                return Err(Error::invalid_value("timezone", "must be a string label"));
            }
        };

        Ok(Self {
            api_token,
            window: ExtractWindow {
                start_date,
                end_date,
                timezone,
            },
            raw: obj,
        })
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Config values exposed to templates: the raw document minus the
    /// credential, with the resolved window merged in
    pub fn template_config(&self) -> JsonValue {
        let mut obj = self.raw.clone();
        obj.remove("api_token");
        obj.insert(
            "start_date".to_string(),
            JsonValue::String(self.window.start_date.to_string()),
        );
        obj.insert(
            "end_date".to_string(),
            JsonValue::String(self.window.end_date.to_string()),
        );
        obj.insert(
            "timezone".to_string(),
            JsonValue::String(self.window.timezone.to_string()),
        );
        JsonValue::Object(obj)
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::invalid_value(field, format!("'{raw}' is not a date: {e}")))
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a source definition from a YAML file
pub fn load_definition(path: impl AsRef<Path>) -> Result<SourceDefinition> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    load_definition_from_str(&contents)
}

/// Load and validate a source definition from a YAML string
pub fn load_definition_from_str(yaml: &str) -> Result<SourceDefinition> {
    let definition: SourceDefinition = serde_yaml::from_str(yaml)?;
    definition.validate()?;
    Ok(definition)
}
