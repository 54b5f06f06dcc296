//! Per-item run orchestration: build input, start the run, wait, read results.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    actors::StartRunOptions,
    client::Client,
    datasets::{OutputMode, ResultItem},
    errors::{Error, Result},
    mapper::{map_schema, FieldDescriptor},
    merge::{default_input_from_build, merge, resolve_user_values},
    runs::RunRecord,
    DEFAULT_POLL_INTERVAL,
};

/// Build tag whose input schema and prefills are used for each run.
pub const DEFAULT_BUILD_TAG: &str = "default";

/// Settings of one configured node.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub actor_id: String,
    /// Build tag to read prefills and the input schema from (defaults to `default`).
    pub build_tag: String,
    /// Form fields the node was generated with. When `None` they are mapped
    /// from the build's input schema on every item.
    pub fields: Option<Vec<FieldDescriptor>>,
    /// Keys accepted as-is even though no field declares them.
    pub passthrough_keys: Vec<String>,
    pub output_mode: OutputMode,
    /// Record a failed item as `{"error": ...}` and go on with the next one.
    pub continue_on_fail: bool,
    pub poll_interval: Duration,
    /// Upper bound on waiting for a started run. `None` waits forever.
    pub execution_timeout: Option<Duration>,
    pub start_options: StartRunOptions,
    /// Page size for reading the dataset (defaults to 999).
    pub page_limit: Option<u32>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            actor_id: String::new(),
            build_tag: DEFAULT_BUILD_TAG.to_string(),
            fields: None,
            passthrough_keys: Vec::new(),
            output_mode: OutputMode::Full,
            continue_on_fail: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            execution_timeout: None,
            start_options: StartRunOptions::default(),
            page_limit: None,
        }
    }
}

impl ExecutionConfig {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_continue_on_fail(mut self, enabled: bool) -> Self {
        self.continue_on_fail = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

/// One output record, linked to the input item it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputItem {
    pub json: Map<String, Value>,
    pub paired_item: usize,
}

impl OutputItem {
    fn error(paired_item: usize, err: &Error) -> Self {
        let mut json = Map::new();
        json.insert("error".to_string(), Value::String(err.to_string()));
        Self { json, paired_item }
    }
}

/// Runs the configured actor once per input item.
#[derive(Clone)]
pub struct ActorRunner {
    client: Client,
    config: ExecutionConfig,
}

impl ActorRunner {
    pub fn new(client: Client, config: ExecutionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Processes `items` one after another; item `i` is finished before `i + 1` starts.
    pub async fn execute(&self, items: &[Map<String, Value>]) -> Result<Vec<OutputItem>> {
        let mut output = Vec::new();
        for (index, user) in items.iter().enumerate() {
            match self.run_item(index, user).await {
                Ok(records) => output.extend(records),
                Err(err) if self.config.continue_on_fail => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        actor_id = %self.config.actor_id,
                        item = index,
                        error = %err,
                        "item failed, continuing"
                    );
                    output.push(OutputItem::error(index, &err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(output)
    }

    /// Full submit, wait and fetch cycle for a single input item.
    pub async fn run_item(
        &self,
        index: usize,
        user: &Map<String, Value>,
    ) -> Result<Vec<OutputItem>> {
        let actor_id = self.config.actor_id.as_str();
        let actors = self.client.actors();

        let build = actors
            .get_build_by_tag(actor_id, &self.config.build_tag)
            .await?;

        let mapped;
        let fields: &[FieldDescriptor] = match &self.config.fields {
            Some(fields) => fields,
            None => {
                mapped = build.input_schema().map(map_schema).unwrap_or_default();
                &mapped.fields
            }
        };
        let user_values = resolve_user_values(fields, &self.config.passthrough_keys, user)?;
        let request = merge(&default_input_from_build(&build), &user_values);

        let started = actors
            .start_run(actor_id, &request, &self.config.start_options)
            .await?;
        let finished = self.wait(&started.id).await?;

        let dataset_id = finished
            .default_dataset_id
            .clone()
            .or(started.default_dataset_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingField {
                field: "defaultDatasetId",
                context: format!("run {} of actor {actor_id}", finished.id),
            })?;
        let records = self
            .client
            .datasets()
            .list_all_items(&dataset_id, self.config.page_limit)
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            actor_id,
            run_id = %finished.id,
            status = %finished.status,
            items = records.len(),
            "dataset fetched"
        );
        shape_output(index, &finished, records, &self.config.output_mode)
    }

    async fn wait(&self, run_id: &str) -> Result<RunRecord> {
        let runs = self.client.runs();
        let wait = runs.wait_for_finish(run_id, self.config.poll_interval);
        let Some(limit) = self.config.execution_timeout else {
            return wait.await;
        };
        let start = Instant::now();
        tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| Error::ExecutionTimeout {
                actor_id: self.config.actor_id.clone(),
                run_id: run_id.to_string(),
                elapsed: start.elapsed(),
            })?
    }
}

/// Full mode merges run metadata into every record (record keys win) and
/// emits the metadata alone for an empty dataset. Reduced mode emits only
/// the projected records.
fn shape_output(
    index: usize,
    run: &RunRecord,
    records: Vec<ResultItem>,
    mode: &OutputMode,
) -> Result<Vec<OutputItem>> {
    let wrap = |json| OutputItem {
        json,
        paired_item: index,
    };
    match mode {
        OutputMode::Reduced { .. } => Ok(mode.project_all(records).into_iter().map(wrap).collect()),
        OutputMode::Full => {
            let metadata = run.to_json()?;
            if records.is_empty() {
                return Ok(vec![wrap(metadata)]);
            }
            Ok(records
                .into_iter()
                .map(|record| {
                    let mut json = metadata.clone();
                    json.extend(record);
                    wrap(json)
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::runs::RunStatus;

    fn record(value: Value) -> ResultItem {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn finished_run() -> RunRecord {
        RunRecord {
            id: "run_1".into(),
            status: RunStatus::Succeeded,
            default_dataset_id: Some("ds_1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn full_output_merges_metadata_with_each_record() {
        let out = shape_output(
            2,
            &finished_run(),
            vec![record(json!({"title": "T", "id": "item-id"}))],
            &OutputMode::Full,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].paired_item, 2);
        assert_eq!(
            Value::Object(out[0].json.clone()),
            json!({
                "id": "item-id",
                "status": "SUCCEEDED",
                "defaultDatasetId": "ds_1",
                "title": "T"
            })
        );
    }

    #[test]
    fn empty_dataset_yields_metadata_only() {
        let out = shape_output(0, &finished_run(), Vec::new(), &OutputMode::Full).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].json.get("id"), Some(&json!("run_1")));
    }

    #[test]
    fn reduced_output_drops_metadata() {
        let out = shape_output(
            0,
            &finished_run(),
            vec![record(json!({"markdown": "a", "other": 1}))],
            &OutputMode::markdown(),
        )
        .unwrap();
        assert_eq!(Value::Object(out[0].json.clone()), json!({"markdown": "a"}));

        let none = shape_output(0, &finished_run(), Vec::new(), &OutputMode::markdown()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn error_item_serializes_with_paired_item() {
        let err = Error::Config("boom".into());
        let item = OutputItem::error(3, &err);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"json": {"error": "configuration error: boom"}, "pairedItem": 3})
        );
    }

    #[test]
    fn config_defaults() {
        let cfg = ExecutionConfig::new("apify/web-scraper");
        assert_eq!(cfg.build_tag, "default");
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert!(cfg.execution_timeout.is_none());
        assert!(!cfg.continue_on_fail);
    }
}
