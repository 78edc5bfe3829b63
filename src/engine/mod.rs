//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncOrchestrator` - drives extraction across the configured stream table
//! - Message types for output (Record, State, Log)
//! - `SyncReport` / `StreamOutcome` - per-run summary

mod types;

pub use types::{Message, StreamOutcome, SyncReport, SyncStats};

use crate::config::{ExtractConfig, SourceDefinition, StreamDescriptor};
use crate::context::{ContextBatch, ContextBuffer};
use crate::cursor::ReplicationCursor;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{PageResult, Paginator};
use crate::state::StateManager;
use crate::template::{self, TemplateContext};
use crate::types::{ChildSyncMode, JsonValue, OptionStringExt, StringMap};
use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Orchestrates extraction across the configured stream table.
///
/// Streams sync one at a time in declared order. A parent stream's child
/// syncs are nested calls rather than parallel tasks, so a child always
/// observes a fully populated context and record order stays deterministic.
pub struct SyncOrchestrator {
    /// Validated source definition
    definition: Arc<SourceDefinition>,
    /// HTTP client (token cache attached)
    client: HttpClient,
    /// Checkpoint store
    state: StateManager,
    /// Template context carrying the runtime config namespace
    template: TemplateContext,
    /// Default lower bound for replication filters
    default_start: String,
    /// Statistics
    stats: SyncStats,
}

impl SyncOrchestrator {
    /// Create an orchestrator for one source
    pub fn new(
        definition: SourceDefinition,
        config: &ExtractConfig,
        client: HttpClient,
        state: StateManager,
    ) -> Self {
        let template = TemplateContext::with_config(config.template_config());
        let default_start = config.window.start_date.to_string();
        Self {
            definition: Arc::new(definition),
            client,
            state,
            template,
            default_start,
            stats: SyncStats::default(),
        }
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }

    /// Sync every top-level stream in declared order.
    ///
    /// A fatal error in one stream is recorded in its outcome and the next
    /// stream still runs; whatever the failed stream emitted before the
    /// error stays in the report. `filter` restricts the run to the named
    /// streams; names that match nothing (or name a child stream) are
    /// warned about and ignored.
    pub async fn sync_all(&mut self, filter: Option<&[String]>) -> SyncReport {
        let run_start = Instant::now();
        let mut outcomes = Vec::new();
        let mut messages = Vec::new();

        if let Some(names) = filter {
            for name in names {
                match self.definition.stream(name) {
                    None => {
                        warn!("stream '{name}' in filter does not exist, ignoring");
                        messages.push(Message::warn(format!(
                            "stream '{name}' in filter does not exist"
                        )));
                    }
                    Some(s) if s.is_child() => {
                        warn!("stream '{name}' is a child stream and syncs through its parent");
                        messages.push(Message::warn(format!(
                            "stream '{name}' is a child stream and syncs through its parent"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        let selected: Vec<StreamDescriptor> = self
            .definition
            .streams
            .iter()
            .filter(|s| !s.is_child())
            .filter(|s| filter.is_none_or(|names| names.iter().any(|n| n == &s.name)))
            .cloned()
            .collect();

        for stream in selected {
            let name = stream.name.clone();
            let records_before = self.stats.records_synced;
            let pages_before = self.stats.pages_fetched;
            let template = self.template.clone();

            match self.sync_tree(stream, template, None, &mut messages).await {
                Ok(()) => {
                    self.stats.add_stream();
                    outcomes.push(StreamOutcome {
                        stream: name,
                        records: self.stats.records_synced - records_before,
                        pages: self.stats.pages_fetched - pages_before,
                        error: None,
                    });
                }
                Err(e) => {
                    self.stats.add_error();
                    error!("stream '{name}' failed: {e}");
                    messages.push(Message::error(format!("stream '{name}' failed: {e}")));
                    outcomes.push(StreamOutcome {
                        stream: name,
                        records: self.stats.records_synced - records_before,
                        pages: self.stats.pages_fetched - pages_before,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(run_start.elapsed().as_millis() as u64);

        SyncReport {
            outcomes,
            messages,
            stats: self.stats.clone(),
        }
    }

    /// Sync one top-level stream (and its children) by name, appending
    /// output to `messages`. Messages emitted before a failure are already
    /// appended when this returns `Err`.
    pub async fn sync_stream(&mut self, name: &str, messages: &mut Vec<Message>) -> Result<()> {
        let stream = self
            .definition
            .stream(name)
            .ok_or_else(|| Error::StreamNotFound {
                stream: name.to_string(),
            })?
            .clone();

        if stream.is_child() {
            return Err(Error::invalid_value(
                format!("streams.{name}"),
                "child streams sync through their parent",
            ));
        }

        let template = self.template.clone();
        self.sync_tree(stream, template, None, messages).await?;
        self.stats.add_stream();
        Ok(())
    }

    /// The per-stream state machine: seed the cursor, paginate, fan out to
    /// child streams, persist the checkpoint once the stream drains.
    ///
    /// Output accumulates into `messages`, which the caller keeps on error;
    /// any checkpoint persisted mid-tree already has its records in the
    /// buffer when the error surfaces.
    ///
    /// `partition` carries the parent-context key for child invocations
    /// (the joined identifier batch, or the single identifier); it doubles
    /// as the partition key for partitioned child state.
    fn sync_tree<'a>(
        &'a mut self,
        stream: StreamDescriptor,
        template: TemplateContext,
        partition: Option<String>,
        messages: &'a mut Vec<Message>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut records_seen = 0usize;
            let mut pages_seen = 0usize;

            messages.push(Message::info(format!(
                "starting sync for stream: {}",
                stream.name
            )));

            // Seed the cursor from persisted state
            let mut cursor = stream
                .replication_key
                .as_ref()
                .map(|field| ReplicationCursor::new(field, stream.is_sorted));
            let mut filter_value = None;
            if let Some(cursor) = cursor.as_mut() {
                let previous = self
                    .previous_checkpoint(&stream, partition.as_deref())
                    .await;
                filter_value = Some(cursor.seed(previous, &self.default_start));
            }

            // Request assembly: source defaults, then stream params, then
            // the replication filter, then the parent-context batch
            let mut base_params = StringMap::new();
            for (key, value) in &self.definition.request_defaults.params {
                let rendered = template::render(value, &template)?;
                if !rendered.is_empty() {
                    base_params.insert(key.clone(), rendered);
                }
            }
            for (key, value) in &stream.params {
                let rendered = template::render(value, &template)?;
                if rendered.is_empty() {
                    debug!(
                        "stream '{}': param '{key}' rendered empty, dropped",
                        stream.name
                    );
                    continue;
                }
                base_params.insert(key.clone(), rendered);
            }
            if let Some(filter) = &filter_value {
                base_params.insert(stream.replication_param.clone(), filter.clone());
            }
            if let (Some(link), Some(context_value)) = (&stream.parent, &partition) {
                if let Some(param) = &link.context_param {
                    base_params.insert(param.clone(), context_value.clone());
                }
            }

            let path = template::render(&stream.path, &template)?;
            let url = self.client.build_url(&path);

            // Each child gets its own buffer (per-batch) or identifier list
            let definition = Arc::clone(&self.definition);
            let mut batched: Vec<(StreamDescriptor, ContextBuffer)> = Vec::new();
            let mut deferred: Vec<(StreamDescriptor, Vec<String>)> = Vec::new();
            for child in definition.children_of(&stream.name) {
                match child.child_sync {
                    ChildSyncMode::PerBatch => {
                        batched.push((child.clone(), ContextBuffer::new(child.batch_size)));
                    }
                    ChildSyncMode::PerIdentifier => deferred.push((child.clone(), Vec::new())),
                }
            }

            let mut paginator = Paginator::new(stream.pagination.clone(), &stream.name);

            while paginator.has_more() {
                let request = paginator.next_request(&url, base_params.clone());

                debug!(
                    "stream '{}': fetching page {} from {}",
                    stream.name, request.selector, request.url
                );

                let mut req_config = RequestConfig::new();
                for (key, value) in &request.query {
                    req_config = req_config.query(key, value);
                }
                for (key, value) in &stream.headers {
                    req_config = req_config.header(key, value);
                }

                let response = self.client.get_with_config(&request.url, req_config).await?;
                let body: JsonValue = response.json().await.map_err(|e| {
                    Error::decode(format!(
                        "page {} of stream '{}' is not valid JSON: {e}",
                        request.selector, stream.name
                    ))
                })?;

                self.stats.add_page();
                pages_seen += 1;

                let page = PageResult::parse(
                    request.selector,
                    body,
                    &stream.records_key,
                    &stream.pagination,
                );

                debug!(
                    "stream '{}': page {} carried {} records",
                    stream.name,
                    page.selector,
                    page.len()
                );

                for record in &page.records {
                    if let Some(cursor) = cursor.as_mut() {
                        cursor.observe(record);
                    }

                    messages.push(Message::record(&stream.name, record.clone()));
                    self.stats.add_records(1);
                    records_seen += 1;

                    // Interleaved fan-out: a full batch runs the child sync
                    // before the parent fetches its next page
                    for (child, buffer) in &mut batched {
                        let Some(link) = &child.parent else { continue };
                        match key_value(record, &link.key_field) {
                            Some(id) => buffer.append(id),
                            None => {
                                warn!(
                                    "stream '{}': record missing key field '{}', not fanned out",
                                    stream.name, link.key_field
                                );
                                continue;
                            }
                        }
                        if buffer.pending().flush {
                            let batch = buffer.take();
                            self.run_child_batch(child, &template, batch, messages).await?;
                        }
                    }

                    for (child, ids) in &mut deferred {
                        let Some(link) = &child.parent else { continue };
                        match key_value(record, &link.key_field) {
                            Some(id) => ids.push(id),
                            None => warn!(
                                "stream '{}': record missing key field '{}', not fanned out",
                                stream.name, link.key_field
                            ),
                        }
                    }
                }

                paginator.advance(&page);
            }

            // Draining: flush the trailing partial batch of each child
            for (child, buffer) in &mut batched {
                buffer.finalize();
                let batch = buffer.take();
                self.run_child_batch(child, &template, batch, messages).await?;
            }

            // Done: persist the checkpoint this sync earned. Children
            // without partitioned state resync fully each run instead.
            if let Some(cursor) = &cursor {
                if let Some(checkpoint) = cursor.checkpoint() {
                    if stream.partitioned_state {
                        if let Some(partition_id) = &partition {
                            self.state
                                .set_partition_checkpoint(
                                    &stream.name,
                                    partition_id,
                                    checkpoint.to_string(),
                                )
                                .await?;
                            messages.push(Message::state(
                                &stream.name,
                                json!({ "partition": partition_id, "checkpoint": checkpoint }),
                            ));
                        }
                    } else if !stream.is_child() {
                        self.state
                            .set_checkpoint(&stream.name, checkpoint.to_string())
                            .await?;
                        messages.push(Message::state(
                            &stream.name,
                            json!({ "checkpoint": checkpoint }),
                        ));
                    }
                }
            }

            // Per-identifier children run once the parent has drained
            for (child, ids) in deferred {
                for id in ids {
                    self.run_child_identifier(&child, &template, id, messages).await?;
                }
            }

            info!(
                "completed sync for stream '{}': {records_seen} records in {pages_seen} pages",
                stream.name
            );
            messages.push(Message::info(format!(
                "completed sync for {}: {records_seen} records in {pages_seen} pages",
                stream.name
            )));

            Ok(())
        })
    }

    /// Run one child sync for a flushed identifier batch. Empty batches
    /// (a finalize with nothing pending) are skipped.
    async fn run_child_batch(
        &mut self,
        child: &StreamDescriptor,
        template: &TemplateContext,
        batch: ContextBatch,
        messages: &mut Vec<Message>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        debug!(
            "child stream '{}': syncing batch of {} ids",
            child.name,
            batch.len()
        );
        let partition_key = batch.ids.join(",");
        let child_template = template.with_context(json!({ "ids": batch.ids }));
        self.sync_tree(child.clone(), child_template, Some(partition_key), messages)
            .await?;
        self.stats.add_child_sync();
        Ok(())
    }

    /// Run one child sync for a single parent identifier
    async fn run_child_identifier(
        &mut self,
        child: &StreamDescriptor,
        template: &TemplateContext,
        id: String,
        messages: &mut Vec<Message>,
    ) -> Result<()> {
        debug!("child stream '{}': syncing id {id}", child.name);
        let child_template = template.with_context(json!({ "id": id.as_str() }));
        self.sync_tree(child.clone(), child_template, Some(id), messages)
            .await?;
        self.stats.add_child_sync();
        Ok(())
    }

    /// The persisted checkpoint to seed a sync from, if any. An empty
    /// checkpoint in a hand-edited state file reads as absent.
    async fn previous_checkpoint(
        &self,
        stream: &StreamDescriptor,
        partition: Option<&str>,
    ) -> Option<String> {
        if stream.partitioned_state {
            let partition_id = partition?;
            self.state
                .get_partition_checkpoint(&stream.name, partition_id)
                .await
                .none_if_empty()
        } else if stream.is_child() {
            None
        } else {
            self.state.get_checkpoint(&stream.name).await.none_if_empty()
        }
    }
}

/// Read a scalar identifier from a parent record through a dot-notation path
fn key_value(record: &JsonValue, field: &str) -> Option<String> {
    let mut current = record;
    for part in field.split('.') {
        current = current.as_object()?.get(part)?;
    }
    match current {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
