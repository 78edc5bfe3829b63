// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Wellspring
//!
//! An incremental extraction engine for windowed REST reporting APIs.
//! Sources are described declaratively in YAML; the engine handles auth,
//! pagination, checkpointing, and parent/child fan-out.
//!
//! ## Features
//!
//! - **YAML-defined sources**: base URL, auth endpoint, and a stream table
//!   drive the whole sync
//! - **Token-exchange auth**: one pre-shared secret swapped for a bearer
//!   token, re-acquired once on rejection
//! - **Pagination**: `non_empty_body` and `page_count` strategies behind a
//!   shared selector contract
//! - **Incremental sync**: per-stream (and per-partition) replication
//!   checkpoints, persisted atomically
//! - **Parent/child fan-out**: identifier batching with interleaved
//!   (`per_batch`) or deferred (`per_identifier`) child syncs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wellspring::{
//!     load_definition, ExtractConfig, HttpClient, HttpClientConfig, Result,
//!     StateManager, SyncOrchestrator, TokenCache,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load the source definition from YAML
//!     let definition = load_definition("sources/mediago.yaml")?;
//!     let config = ExtractConfig::from_json(
//!         r#"{"api_token": "...", "start_date": "2024-01-01"}"#,
//!     )?;
//!
//!     // Wire the token exchange into the HTTP client
//!     let endpoint =
//!         TokenCache::resolve_endpoint(&definition.base_url, &definition.auth.endpoint)?;
//!     let tokens = TokenCache::new(
//!         endpoint,
//!         definition.auth.token_path.clone(),
//!         config.api_token.clone(),
//!     );
//!     let client = HttpClient::with_tokens(HttpClientConfig::from_source(&definition), tokens);
//!
//!     // Sync every stream, resuming from saved checkpoints
//!     let state = StateManager::from_file("state.json")?;
//!     let mut orchestrator = SyncOrchestrator::new(definition, &config, client, state);
//!     let report = orchestrator.sync_all(None).await;
//!
//!     for message in &report.messages {
//!         println!("{}", serde_json::to_string(message)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        SyncOrchestrator                        │
//! │  sync_all(filter) → SyncReport    sync_stream(name, messages)  │
//! └────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌────────────┬───────────┬──────┴────────┬────────────┬──────────┐
//! │    Auth    │   HTTP    │   Paginate    │  Fan-out   │  State   │
//! ├────────────┼───────────┼───────────────┼────────────┼──────────┤
//! │ TokenCache │ GET/POST  │ non_empty_body│ ContextBuf │ Check-   │
//! │ Exchange   │ Retry     │ page_count    │ per_batch  │ points   │
//! │ Invalidate │ Rate limit│ none          │ per_ident  │ Atomic   │
//! └────────────┴───────────┴───────────────┴────────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Token-exchange authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Identifier batching for child-stream fan-out
pub mod context;

/// Replication-key high-water-mark tracking
pub mod cursor;

/// State management and checkpointing
pub mod state;

/// Main execution engine
pub mod engine;

/// Source definitions and runtime configuration
pub mod config;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::TokenCache;
pub use config::{
    load_definition, load_definition_from_str, ExtractConfig, SourceDefinition, StreamDescriptor,
};
pub use context::ContextBuffer;
pub use cursor::ReplicationCursor;
pub use engine::{Message, SyncOrchestrator, SyncReport};
pub use http::{HttpClient, HttpClientConfig};
pub use pagination::{PaginationMode, Paginator};
pub use state::StateManager;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
