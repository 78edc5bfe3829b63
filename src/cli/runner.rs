//! CLI runner - executes commands

use crate::auth::TokenCache;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_definition, ExtractConfig, SourceDefinition};
use crate::engine::{Message, SyncOrchestrator};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::fs;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Sync {
                streams,
                config_json,
            } => self.sync(streams.as_deref(), config_json.as_deref()).await,
            Commands::Validate { config_json } => self.validate(config_json.as_deref()),
            Commands::Streams => self.streams(),
        }
    }

    /// Load the source definition
    fn load_source(&self) -> Result<SourceDefinition> {
        let path = self
            .cli
            .source
            .as_ref()
            .ok_or_else(|| Error::config("Source file not specified (use -s flag)"))?;
        load_definition(path)
    }

    /// Load the runtime configuration
    fn load_config(&self, inline: Option<&str>) -> Result<ExtractConfig> {
        // Inline config takes precedence
        if let Some(json_str) = inline {
            return ExtractConfig::from_json(json_str);
        }

        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
            return ExtractConfig::from_json(&content);
        }

        Err(Error::config(
            "Runtime config not specified (use -C or --config-json)",
        ))
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Sync streams
    async fn sync(&self, streams: Option<&str>, config_json: Option<&str>) -> Result<()> {
        let definition = self.load_source()?;
        let config = self.load_config(config_json)?;
        let state = self.load_state()?;

        let filter: Option<Vec<String>> = streams.map(|names| {
            names
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        });

        let endpoint =
            TokenCache::resolve_endpoint(&definition.base_url, &definition.auth.endpoint)?;
        let tokens = TokenCache::new(
            endpoint,
            definition.auth.token_path.clone(),
            config.api_token.clone(),
        );

        let http_config = HttpClientConfig::from_source(&definition);
        let client = HttpClient::with_tokens(http_config, tokens);

        let source_name = definition.metadata.name.clone();
        let mut orchestrator = SyncOrchestrator::new(definition, &config, client, state);

        self.output_message(&serde_json::to_value(Message::info(format!(
            "Starting sync for {source_name} ({} to {})",
            config.window.start_date, config.window.end_date
        )))?);

        let report = orchestrator.sync_all(filter.as_deref()).await;

        for message in &report.messages {
            self.output_message(&serde_json::to_value(message)?);
        }

        // Emit the full state document so callers capturing stdout can
        // persist it even without a --state path
        let state_doc = serde_json::to_value(&*orchestrator.state().state().await)?;
        if state_doc
            .get("streams")
            .and_then(Value::as_object)
            .is_some_and(|streams| !streams.is_empty())
        {
            self.output_message(&json!({
                "type": "STATE",
                "state": state_doc
            }));
        }

        let successful_streams = report.outcomes.iter().filter(|o| o.is_ok()).count();
        let failed_streams = report.outcomes.len() - successful_streams;

        let status = if failed_streams == 0 {
            "SUCCEEDED"
        } else if successful_streams == 0 {
            "FAILED"
        } else {
            "PARTIAL"
        };

        let stream_results: Vec<Value> = report
            .outcomes
            .iter()
            .map(|outcome| match &outcome.error {
                None => json!({
                    "stream": outcome.stream,
                    "status": "SUCCESS",
                    "records_synced": outcome.records,
                    "pages_fetched": outcome.pages
                }),
                Some(error) => json!({
                    "stream": outcome.stream,
                    "status": "FAILED",
                    "error": error,
                    "records_synced": outcome.records,
                    "pages_fetched": outcome.pages
                }),
            })
            .collect();

        self.output_message(&json!({
            "type": "SYNC_SUMMARY",
            "summary": {
                "status": status,
                "source": source_name,
                "total_records": report.stats.records_synced,
                "total_pages": report.stats.pages_fetched,
                "child_syncs": report.stats.child_syncs,
                "total_streams": report.outcomes.len(),
                "successful_streams": successful_streams,
                "failed_streams": failed_streams,
                "duration_ms": report.stats.duration_ms,
                "state_file": self.cli.state.as_ref().map(|p| p.to_string_lossy().to_string()),
                "streams": stream_results
            }
        }));

        // Checkpoints auto-save as streams finish; one last save covers a
        // run where no stream reached a checkpoint
        orchestrator.state().save().await?;

        Ok(())
    }

    /// Validate the source definition (and the runtime config if given)
    fn validate(&self, config_json: Option<&str>) -> Result<()> {
        let definition = self.load_source()?;

        self.output_message(&serde_json::to_value(Message::info(format!(
            "Source '{}' v{} is valid with {} streams",
            definition.metadata.name,
            definition.version,
            definition.streams.len()
        )))?);

        // Config validation is opt-in here so a definition can be checked on
        // its own
        if config_json.is_some() || self.cli.config.is_some() {
            let config = self.load_config(config_json)?;
            self.output_message(&serde_json::to_value(Message::info(format!(
                "Runtime config is valid (window {} to {}, timezone {})",
                config.window.start_date, config.window.end_date, config.window.timezone
            )))?);
        }

        Ok(())
    }

    /// List streams declared by the source
    fn streams(&self) -> Result<()> {
        let definition = self.load_source()?;

        let streams: Vec<Value> = definition
            .streams
            .iter()
            .map(|stream| {
                json!({
                    "name": stream.name,
                    "path": stream.path,
                    "replication_key": stream.replication_key,
                    "parent": stream.parent.as_ref().map(|p| p.stream.clone()),
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "source": definition.metadata.name,
            "streams": streams
        }));

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
