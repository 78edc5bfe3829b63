//! Replication checkpoint tracking
//!
//! One `ReplicationCursor` lives for one sync of one stream. It is seeded
//! from the persisted checkpoint (or the configured start of the extraction
//! window), watches every record that passes through, and yields the value
//! to persist once the stream drains.

use crate::types::JsonValue;
use tracing::debug;

/// High-water tracker for a stream's replication key.
///
/// Values compare as strings, which is exact for ISO dates and date-times;
/// numeric fields go through their canonical string form. For streams the
/// source declares sorted by the replication key, the last observed value
/// is taken directly instead of comparing.
#[derive(Debug, Clone)]
pub struct ReplicationCursor {
    field: String,
    is_sorted: bool,
    high_water: Option<String>,
}

impl ReplicationCursor {
    /// Create a cursor over the given record field
    pub fn new(field: impl Into<String>, is_sorted: bool) -> Self {
        Self {
            field: field.into(),
            is_sorted,
            high_water: None,
        }
    }

    /// The record field this cursor watches
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Prime the cursor and return the starting filter value.
    ///
    /// A previous checkpoint both becomes the filter and primes the
    /// high-water mark, so a sync that observes nothing re-persists the
    /// same checkpoint instead of losing it.
    pub fn seed(&mut self, previous: Option<String>, default_start: &str) -> String {
        match previous {
            Some(checkpoint) => {
                self.high_water = Some(checkpoint.clone());
                checkpoint
            }
            None => default_start.to_string(),
        }
    }

    /// Fold one record into the high-water mark.
    ///
    /// Records missing the field (or carrying a non-scalar value) are
    /// skipped; they still flow downstream, they just cannot advance the
    /// checkpoint.
    pub fn observe(&mut self, record: &JsonValue) {
        let Some(value) = field_value(record, &self.field) else {
            debug!(
                "record has no usable '{}' value, skipping for checkpoint",
                self.field
            );
            return;
        };

        if self.is_sorted {
            self.high_water = Some(value);
        } else if self.high_water.as_deref() < Some(value.as_str()) {
            self.high_water = Some(value);
        }
    }

    /// The value to persist once the stream drains, if any
    pub fn checkpoint(&self) -> Option<&str> {
        self.high_water.as_deref()
    }
}

/// Read a scalar record field through a dot-notation path
fn field_value(record: &JsonValue, path: &str) -> Option<String> {
    let mut current = record;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    match current {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tracks_maximum_out_of_order() {
        let mut cursor = ReplicationCursor::new("date", false);
        cursor.observe(&json!({"date": "2024-01-03"}));
        cursor.observe(&json!({"date": "2024-01-01"}));
        cursor.observe(&json!({"date": "2024-01-02"}));

        assert_eq!(cursor.checkpoint(), Some("2024-01-03"));
    }

    #[test]
    fn test_sorted_takes_last_seen() {
        let mut cursor = ReplicationCursor::new("date", true);
        cursor.observe(&json!({"date": "2024-01-03"}));
        cursor.observe(&json!({"date": "2024-01-01"}));

        // Declared-sorted streams trust the source's ordering
        assert_eq!(cursor.checkpoint(), Some("2024-01-01"));
    }

    #[test]
    fn test_seed_returns_previous_checkpoint() {
        let mut cursor = ReplicationCursor::new("date", false);
        let filter = cursor.seed(Some("2024-02-01".to_string()), "2024-01-01");

        assert_eq!(filter, "2024-02-01");
        assert_eq!(cursor.checkpoint(), Some("2024-02-01"));
    }

    #[test]
    fn test_seed_falls_back_to_default_start() {
        let mut cursor = ReplicationCursor::new("date", false);
        let filter = cursor.seed(None, "2024-01-01");

        assert_eq!(filter, "2024-01-01");
        // Nothing observed yet, so there is nothing to persist
        assert_eq!(cursor.checkpoint(), None);
    }

    #[test]
    fn test_checkpoint_never_regresses_unsorted() {
        let mut cursor = ReplicationCursor::new("date", false);
        cursor.seed(Some("2024-02-01".to_string()), "2024-01-01");
        cursor.observe(&json!({"date": "2024-01-15"}));

        assert_eq!(cursor.checkpoint(), Some("2024-02-01"));
    }

    #[test]
    fn test_empty_sync_re_persists_previous() {
        let mut cursor = ReplicationCursor::new("date", true);
        cursor.seed(Some("2024-03-01".to_string()), "2024-01-01");

        assert_eq!(cursor.checkpoint(), Some("2024-03-01"));
    }

    #[test]
    fn test_records_missing_the_field_are_skipped() {
        let mut cursor = ReplicationCursor::new("date", false);
        cursor.observe(&json!({"date": "2024-01-02"}));
        cursor.observe(&json!({"name": "no date here"}));
        cursor.observe(&json!({"date": null}));

        assert_eq!(cursor.checkpoint(), Some("2024-01-02"));
    }

    #[test]
    fn test_nested_field_path() {
        let mut cursor = ReplicationCursor::new("meta.updated_at", false);
        cursor.observe(&json!({"meta": {"updated_at": "2024-05-05"}}));

        assert_eq!(cursor.checkpoint(), Some("2024-05-05"));
    }

    #[test]
    fn test_numeric_values_compare_as_strings() {
        let mut cursor = ReplicationCursor::new("seq", false);
        cursor.observe(&json!({"seq": 12}));
        cursor.observe(&json!({"seq": 9}));

        // Canonical string comparison: "9" > "12"
        assert_eq!(cursor.checkpoint(), Some("9"));
    }

    #[test]
    fn test_non_object_records_are_skipped() {
        let mut cursor = ReplicationCursor::new("date", false);
        cursor.observe(&json!("bare string"));
        cursor.observe(&json!(["a", "b"]));

        assert_eq!(cursor.checkpoint(), None);
    }
}
