//! State types for tracking extraction progress
//!
//! These types are serialized to JSON and persisted between runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete persisted state for a source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: HashMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Get the checkpoint for a stream
    pub fn get_checkpoint(&self, stream: &str) -> Option<&str> {
        self.streams.get(stream)?.checkpoint.as_deref()
    }

    /// Set the checkpoint for a stream
    pub fn set_checkpoint(&mut self, stream: &str, checkpoint: String) {
        self.get_stream_mut(stream).checkpoint = Some(checkpoint);
    }
}

/// State for a single stream.
///
/// Top-level incremental streams use `checkpoint`; child streams with
/// partitioned state keep one checkpoint per parent context under
/// `partitions` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamState {
    /// Replication checkpoint (for incremental extraction)
    #[serde(default)]
    pub checkpoint: Option<String>,

    /// Per-partition checkpoints, keyed by parent context
    #[serde(default)]
    pub partitions: HashMap<String, String>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the checkpoint for a partition
    pub fn get_partition(&self, partition_id: &str) -> Option<&str> {
        self.partitions.get(partition_id).map(String::as_str)
    }

    /// Set the checkpoint for a partition
    pub fn set_partition(&mut self, partition_id: &str, checkpoint: String) {
        self.partitions.insert(partition_id.to_string(), checkpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.streams.is_empty());
    }

    #[test]
    fn test_state_checkpoint() {
        let mut state = State::new();
        assert!(state.get_checkpoint("campaigns").is_none());

        state.set_checkpoint("campaigns", "2024-01-01".to_string());
        assert_eq!(state.get_checkpoint("campaigns"), Some("2024-01-01"));
    }

    #[test]
    fn test_stream_state_partitions() {
        let mut stream_state = StreamState::new();

        assert!(stream_state.get_partition("A").is_none());

        stream_state.set_partition("A", "2024-01-03".to_string());
        assert_eq!(stream_state.get_partition("A"), Some("2024-01-03"));
        assert!(stream_state.get_partition("B").is_none());
    }

    #[test]
    fn test_state_serialization() {
        let mut state = State::new();
        state.set_checkpoint("campaigns", "2024-06-01".to_string());
        state
            .get_stream_mut("campaign_report")
            .set_partition("A", "2024-05-15".to_string());

        let json = serde_json::to_string(&state).unwrap();
        let restored: State = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.get_checkpoint("campaigns"), Some("2024-06-01"));
        assert_eq!(
            restored
                .get_stream("campaign_report")
                .unwrap()
                .get_partition("A"),
            Some("2024-05-15")
        );
    }
}
