//! Incremental sync state
//!
//! Persists per-stream checkpoints between runs so each sync resumes from
//! where the previous one left off. Child streams with partitioned state
//! keep one checkpoint per parent context.
//!
//! State lives in a JSON file written atomically (temp file + rename), or
//! entirely in memory for tests and one-shot runs.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{State, StreamState};
