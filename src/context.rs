//! Identifier batching for parent-to-child fan-out
//!
//! A parent stream discovers child identifiers one record at a time; the
//! `ContextBuffer` groups them into bounded batches so the child endpoint
//! can be called once per batch instead of once per identifier.

use serde::Serialize;

/// Default identifier capacity per batch
pub const DEFAULT_CAPACITY: usize = 150;

/// A batch of identifiers plus the flag that marks it ready to emit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextBatch {
    /// Identifiers in append order, duplicates preserved
    pub ids: Vec<String>,
    /// Whether this batch is ready to be handed to a child sync
    pub flush: bool,
}

impl ContextBatch {
    /// Number of buffered identifiers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch holds no identifiers
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Bounded accumulator of child identifiers.
///
/// Appends set the flush flag as soon as the batch reaches capacity; the
/// caller is expected to [`take`](ContextBuffer::take) the batch whenever
/// [`pending`](ContextBuffer::pending) reports it flushed, so no emitted
/// batch ever exceeds the capacity. `finalize` force-flushes whatever
/// remains after the last append, which may be an empty batch.
#[derive(Debug, Clone)]
pub struct ContextBuffer {
    capacity: usize,
    batch: ContextBatch,
}

impl ContextBuffer {
    /// Create a buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            batch: ContextBatch::default(),
        }
    }

    /// The configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one identifier, marking the batch flushed when it fills
    pub fn append(&mut self, id: impl Into<String>) {
        self.batch.ids.push(id.into());
        if self.batch.ids.len() >= self.capacity {
            self.batch.flush = true;
        }
    }

    /// Force-flush the remainder after the final append
    pub fn finalize(&mut self) {
        self.batch.flush = true;
    }

    /// The current batch, flushed or not
    pub fn pending(&self) -> &ContextBatch {
        &self.batch
    }

    /// Hand over the current batch and reset the buffer
    pub fn take(&mut self) -> ContextBatch {
        std::mem::take(&mut self.batch)
    }
}

impl Default for ContextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
