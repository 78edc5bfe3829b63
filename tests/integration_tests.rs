//! Integration tests using a mock HTTP server
//!
//! End-to-end flows: YAML source definition → token exchange → paginated
//! requests → messages and checkpoints.

use serde_json::json;
use tempfile::TempDir;
use wellspring::auth::TokenCache;
use wellspring::config::{load_definition_from_str, ExtractConfig, SourceDefinition};
use wellspring::engine::{Message, SyncOrchestrator};
use wellspring::http::{HttpClient, HttpClientConfig};
use wellspring::state::StateManager;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn source_definition(server: &MockServer, streams_yaml: &str) -> SourceDefinition {
    let yaml = format!(
        r#"
metadata:
  name: integration
base_url: "{}"
auth:
  endpoint: "/auth/token"
  token_path: "data.access_token"
streams:
{streams_yaml}
"#,
        server.uri()
    );
    load_definition_from_str(&yaml).unwrap()
}

fn runtime_config() -> ExtractConfig {
    ExtractConfig::from_value(json!({
        "api_token": "secret",
        "start_date": "2024-01-01",
        "end_date": "2024-06-30",
        "timezone": "utc0"
    }))
    .unwrap()
}

fn build_orchestrator(definition: SourceDefinition, state: StateManager) -> SyncOrchestrator {
    let config = runtime_config();
    let endpoint =
        TokenCache::resolve_endpoint(&definition.base_url, &definition.auth.endpoint).unwrap();
    let tokens = TokenCache::new(
        endpoint,
        definition.auth.token_path.clone(),
        config.api_token.clone(),
    );
    let client = HttpClient::with_tokens(HttpClientConfig::from_source(&definition), tokens);
    SyncOrchestrator::new(definition, &config, client, state)
}

/// Mount the token-exchange endpoint. The Basic credential is
/// base64("secret"), matching `runtime_config()`.
async fn mount_token_exchange(server: &MockServer, token: &str, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("Authorization", "Basic c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"access_token": token}
        })))
        .expect(expect)
        .mount(server)
        .await;
}

fn record_streams(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { stream, .. } => Some(stream.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Token Exchange Flow
// ============================================================================

#[tokio::test]
async fn test_single_exchange_serves_all_streams() {
    let server = MockServer::start().await;

    // One exchange, reused by every data request
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/advertisers"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "X"}, {"id": "Y"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let definition = source_definition(
        &server,
        r#"
  - name: campaigns
    path: "/v1/campaigns"
    primary_key: [id]
  - name: advertisers
    path: "/v1/advertisers"
    primary_key: [id]
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let report = orchestrator.sync_all(None).await;

    assert!(report.is_success());
    assert_eq!(report.stats.records_synced, 3);
    assert_eq!(report.stats.streams_synced, 2);
}

#[tokio::test]
async fn test_rejected_token_refreshed_once() {
    let server = MockServer::start().await;

    // First exchange hands out tok-1, the re-exchange hands out tok-2
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("Authorization", "Basic c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"access_token": "tok-1"}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("Authorization", "Basic c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"access_token": "tok-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // tok-1 is rejected exactly once; the retry must carry tok-2
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let definition = source_definition(
        &server,
        r#"
  - name: items
    path: "/v1/items"
    primary_key: [id]
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let mut messages = Vec::new();
    orchestrator
        .sync_stream("items", &mut messages)
        .await
        .unwrap();

    // Two exchanges and two data requests total, enforced by the expects
    assert_eq!(record_streams(&messages), vec!["items"]);
    assert_eq!(orchestrator.stats().records_synced, 1);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_page_count_pagination_three_pages() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    // total=1200 at page_size=500 needs pages 1..=3
    for page in 1..=3u32 {
        Mock::given(method("GET"))
            .and(path("/v1/report"))
            .and(query_param("page", page.to_string()))
            .and(query_param("page_size", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"date": format!("2024-01-0{page}")}],
                "total": 1200
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let definition = source_definition(
        &server,
        r#"
  - name: report
    path: "/v1/report"
    primary_key: [date]
    pagination:
      type: page_count
      page_param: page
      page_size: 500
      page_size_param: page_size
      total_path: total
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let report = orchestrator.sync_all(None).await;

    assert!(report.is_success());
    assert_eq!(report.stats.pages_fetched, 3);
    assert_eq!(report.stats.records_synced, 3);
}

#[tokio::test]
async fn test_sorted_stream_checkpoints_last_date() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/daily"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"date": "2024-01-01"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/daily"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"date": "2024-01-02"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/daily"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let definition = source_definition(
        &server,
        r#"
  - name: daily_report
    path: "/v1/daily"
    primary_key: [date]
    replication_key: date
    is_sorted: true
    pagination:
      type: non_empty_body
      page_param: page
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let mut messages = Vec::new();
    orchestrator
        .sync_stream("daily_report", &mut messages)
        .await
        .unwrap();

    assert_eq!(orchestrator.stats().pages_fetched, 3);
    assert_eq!(
        orchestrator.state().get_checkpoint("daily_report").await,
        Some("2024-01-02".to_string())
    );
    let state_msgs: Vec<_> = messages.iter().filter(|m| m.is_state()).collect();
    assert_eq!(state_msgs.len(), 1);
}

// ============================================================================
// State Persistence and Resume
// ============================================================================

#[tokio::test]
async fn test_resume_from_state_file() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    // The stored checkpoint, not the window start, must seed the filter
    Mock::given(method("GET"))
        .and(path("/v1/daily"))
        .and(query_param("start_date", "2024-03-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"date": "2024-04-01"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        json!({
            "streams": {"daily_report": {"checkpoint": "2024-03-10"}}
        })
        .to_string(),
    )
    .unwrap();

    let definition = source_definition(
        &server,
        r#"
  - name: daily_report
    path: "/v1/daily"
    primary_key: [date]
    replication_key: date
"#,
    );
    let state = StateManager::from_file(&state_path).unwrap();
    let mut orchestrator = build_orchestrator(definition, state);

    orchestrator
        .sync_stream("daily_report", &mut Vec::new())
        .await
        .unwrap();

    // The advanced checkpoint lands back in the file
    let contents = std::fs::read_to_string(&state_path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(doc["streams"]["daily_report"]["checkpoint"], "2024-04-01");
}

#[tokio::test]
async fn test_partition_checkpoints_persisted_per_key() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "A", "updated": "2024-02-01"},
                {"id": "B", "updated": "2024-02-02"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/stats"))
        .and(query_param("campaign_ids", "A,B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A", "date": "2024-02-03"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");

    let definition = source_definition(
        &server,
        r#"
  - name: campaigns
    path: "/v1/campaigns"
    primary_key: [id]
    replication_key: updated
  - name: stats
    path: "/v1/stats"
    primary_key: [id]
    replication_key: date
    parent:
      stream: campaigns
      key_field: id
      context_param: campaign_ids
    child_sync: per_batch
    partitioned_state: true
"#,
    );
    let state = StateManager::from_file(&state_path).unwrap();
    let mut orchestrator = build_orchestrator(definition, state);

    orchestrator
        .sync_stream("campaigns", &mut Vec::new())
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&state_path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();

    // The parent keeps a stream checkpoint and never writes partitions
    assert_eq!(doc["streams"]["campaigns"]["checkpoint"], "2024-02-02");
    assert_eq!(doc["streams"]["campaigns"]["partitions"], json!({}));

    // The child keeps one checkpoint per parent-context key
    assert_eq!(doc["streams"]["stats"]["partitions"]["A,B"], "2024-02-03");
    assert_eq!(doc["streams"]["stats"]["checkpoint"], json!(null));
}

#[tokio::test]
async fn test_partial_sync_delivers_checkpointed_records() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "A", "updated": "2024-02-01"},
                {"id": "B", "updated": "2024-02-02"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/stats"))
        .and(query_param("campaign_ids", "A,B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A", "date": "2024-02-03"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");

    let yaml = format!(
        r#"
metadata:
  name: integration
base_url: "{}"
auth:
  endpoint: "/auth/token"
  token_path: "data.access_token"
http:
  max_attempts: 1
streams:
  - name: campaigns
    path: "/v1/campaigns"
    primary_key: [id]
    replication_key: updated
    pagination:
      type: non_empty_body
      page_param: page
  - name: stats
    path: "/v1/stats"
    primary_key: [id]
    replication_key: date
    parent:
      stream: campaigns
      key_field: id
      context_param: campaign_ids
    child_sync: per_batch
    batch_size: 2
    partitioned_state: true
"#,
        server.uri()
    );
    let definition = load_definition_from_str(&yaml).unwrap();
    let state = StateManager::from_file(&state_path).unwrap();
    let mut orchestrator = build_orchestrator(definition, state);

    let report = orchestrator.sync_all(None).await;

    // The parent failed on page 2, after its first batch's child completed
    assert!(!report.is_success());
    assert_eq!(
        record_streams(&report.messages),
        vec!["campaigns", "campaigns", "stats"]
    );

    // Every checkpoint in the file belongs to records the report delivered
    let contents = std::fs::read_to_string(&state_path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(doc["streams"]["stats"]["partitions"]["A,B"], "2024-02-03");
    assert_eq!(doc["streams"]["campaigns"], json!(null));
}

// ============================================================================
// Sibling Isolation
// ============================================================================

#[tokio::test]
async fn test_failing_stream_does_not_abort_siblings() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/healthy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"date": "2024-01-05"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
metadata:
  name: integration
base_url: "{}"
auth:
  endpoint: "/auth/token"
  token_path: "data.access_token"
http:
  max_attempts: 1
streams:
  - name: broken
    path: "/v1/broken"
    primary_key: [id]
  - name: healthy
    path: "/v1/healthy"
    primary_key: [date]
    replication_key: date
"#,
        server.uri()
    );
    let definition = load_definition_from_str(&yaml).unwrap();
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let report = orchestrator.sync_all(None).await;

    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.outcomes[0].stream, "broken");
    assert!(report.outcomes[0].error.is_some());
    assert!(report.outcomes[1].is_ok());

    // The healthy sibling still checkpointed
    assert_eq!(
        orchestrator.state().get_checkpoint("healthy").await,
        Some("2024-01-05".to_string())
    );
    assert_eq!(report.stats.streams_synced, 1);
    assert_eq!(report.stats.errors, 1);
}

// ============================================================================
// Parent/Child Fan-out
// ============================================================================

#[tokio::test]
async fn test_batched_fan_out_contexts() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A"}, {"id": "B"}, {"id": "C"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Batch [A, B] fills at capacity, [C] is the finalize flush
    Mock::given(method("GET"))
        .and(path("/v1/stats"))
        .and(query_param("campaign_ids", "A,B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A"}, {"id": "B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/stats"))
        .and(query_param("campaign_ids", "C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "C"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let definition = source_definition(
        &server,
        r#"
  - name: campaigns
    path: "/v1/campaigns"
    primary_key: [id]
  - name: stats
    path: "/v1/stats"
    primary_key: [id]
    parent:
      stream: campaigns
      key_field: id
      context_param: campaign_ids
    child_sync: per_batch
    batch_size: 2
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let mut messages = Vec::new();
    orchestrator
        .sync_stream("campaigns", &mut messages)
        .await
        .unwrap();

    assert_eq!(
        record_streams(&messages),
        vec!["campaigns", "campaigns", "stats", "stats", "campaigns", "stats"]
    );
    assert_eq!(orchestrator.stats().child_syncs, 2);
}

#[tokio::test]
async fn test_per_identifier_children_after_drain() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/campaigns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A"}, {"id": "B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/campaign/A/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "A"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/campaign/B/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let definition = source_definition(
        &server,
        r#"
  - name: campaigns
    path: "/v1/campaigns"
    primary_key: [id]
  - name: stats
    path: "/v1/campaign/{{ context.id }}/stats"
    primary_key: [id]
    parent:
      stream: campaigns
      key_field: id
    child_sync: per_identifier
"#,
    );
    let mut orchestrator = build_orchestrator(definition, StateManager::in_memory());

    let mut messages = Vec::new();
    orchestrator
        .sync_stream("campaigns", &mut messages)
        .await
        .unwrap();

    // Every parent record is emitted before any child sync starts
    assert_eq!(
        record_streams(&messages),
        vec!["campaigns", "campaigns", "stats", "stats"]
    );
    assert_eq!(orchestrator.stats().child_syncs, 2);
}
