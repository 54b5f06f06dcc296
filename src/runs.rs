//! Actor runs: status lookups and waiting for a run to finish.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::sleep;

use crate::{
    client::{ClientInner, DataEnvelope},
    errors::{Error, Result, ValidationError},
    telemetry::RunMetrics,
};

/// Lifecycle status of a run. Unknown values are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    #[default]
    Ready,
    Running,
    Succeeded,
    Failed,
    TimingOut,
    TimedOut,
    Aborting,
    Aborted,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Ready => "READY",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::TimingOut => "TIMING-OUT",
            RunStatus::TimedOut => "TIMED-OUT",
            RunStatus::Aborting => "ABORTING",
            RunStatus::Aborted => "ABORTED",
            RunStatus::Other(raw) => raw.as_str(),
        }
    }

    /// `SUCCEEDED`, `FAILED`, `TIMED-OUT` and `ABORTED` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::TimedOut | RunStatus::Aborted
        )
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "READY" => RunStatus::Ready,
            "RUNNING" => RunStatus::Running,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            "TIMING-OUT" => RunStatus::TimingOut,
            "TIMED-OUT" => RunStatus::TimedOut,
            "ABORTING" => RunStatus::Aborting,
            "ABORTED" => RunStatus::Aborted,
            _ => RunStatus::Other(value),
        }
    }
}

impl From<&str> for RunStatus {
    fn from(value: &str) -> Self {
        RunStatus::from(value.to_string())
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run as reported by the API. Fields not modelled here are kept in `extra`
/// so the full record can be echoed back as output metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act_id: Option<String>,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dataset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunRecord {
    /// The record as a JSON object, including unmodelled fields.
    pub fn to_json(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

#[derive(Clone)]
pub struct RunsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl RunsClient {
    /// GET the current state of a run.
    pub async fn get(&self, run_id: &str) -> Result<RunRecord> {
        if run_id.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("run_id is required").with_field("run_id"),
            ));
        }
        let path = format!("/v2/actor-runs/{}", urlencoding::encode(run_id));
        let builder = self.inner.json_request(Method::GET, &path)?;
        let ctx = self.inner.make_context(&Method::GET, &path, Some(run_id));
        let envelope: DataEnvelope<RunRecord> = self
            .inner
            .execute_json(builder, Method::GET, None, ctx)
            .await?;
        envelope.data.ok_or_else(|| Error::MissingField {
            field: "data",
            context: format!("run {run_id}"),
        })
    }

    /// Polls the run every `interval` until it reaches a terminal status.
    ///
    /// There is no iteration cap: callers bound the wait themselves (see
    /// `ExecutionConfig::execution_timeout`). A failed status fetch ends the
    /// wait immediately with [`Error::Poll`]; only "not finished yet" is retried.
    pub async fn wait_for_finish(&self, run_id: &str, interval: Duration) -> Result<RunRecord> {
        let start = Instant::now();
        let mut polls = 0u32;
        let mut last_status: Option<RunStatus> = None;
        loop {
            polls += 1;
            let run = self.get(run_id).await.map_err(|err| Error::Poll {
                run_id: run_id.to_string(),
                source: Box::new(err),
            })?;

            if last_status.as_ref() != Some(&run.status) {
                #[cfg(feature = "tracing")]
                tracing::info!(run_id, status = %run.status, polls, "run status changed");
                last_status = Some(run.status.clone());
            }

            if run.status.is_terminal() {
                self.inner.telemetry.record_run(RunMetrics {
                    run_id: run_id.to_string(),
                    status: run.status.clone(),
                    polls,
                    elapsed: start.elapsed(),
                });
                return Ok(run);
            }
            sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn terminal_statuses() {
        for status in ["SUCCEEDED", "FAILED", "TIMED-OUT", "ABORTED"] {
            assert!(RunStatus::from(status).is_terminal(), "{status}");
        }
        for status in ["READY", "RUNNING", "TIMING-OUT", "ABORTING", "PAUSED"] {
            assert!(!RunStatus::from(status).is_terminal(), "{status}");
        }
    }

    #[test]
    fn unknown_status_round_trips_verbatim() {
        let status: RunStatus = serde_json::from_value(json!("PAUSED")).unwrap();
        assert_eq!(status, RunStatus::Other("PAUSED".into()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("PAUSED"));
    }

    #[test]
    fn run_record_keeps_unmodelled_fields() {
        let raw = json!({
            "id": "run_1",
            "actId": "act_1",
            "status": "SUCCEEDED",
            "defaultDatasetId": "ds_1",
            "startedAt": "2025-01-01T00:00:00.000Z",
            "stats": { "computeUnits": 0.01 },
            "buildNumber": "0.1.2"
        });
        let run: RunRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(run.default_dataset_id.as_deref(), Some("ds_1"));
        assert_eq!(run.extra.get("buildNumber"), Some(&json!("0.1.2")));
        assert_eq!(Value::Object(run.to_json().unwrap()), raw);
    }
}
