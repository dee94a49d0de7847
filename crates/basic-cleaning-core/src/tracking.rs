use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::ObjectBackend;
use crate::error::CleaningError;
use crate::reference::ArtifactReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: String,
    pub kind: String,
    pub message: String,
}

/// Provenance record persisted at `runs/<run_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub job_type: String,
    pub config: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub failure: Option<RunFailure>,
    pub used_artifacts: Vec<String>,
    pub logged_artifacts: Vec<String>,
}

pub fn run_key(run_id: Uuid) -> String {
    format!("runs/{run_id}.json")
}

/// Records runs alongside the artifacts they touch. Tracking never fails a
/// job: write errors are logged and dropped.
#[derive(Clone)]
pub struct RunTracker {
    backend: Arc<dyn ObjectBackend>,
}

impl RunTracker {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    pub async fn start_run<C: Serialize>(&self, job_type: &str, config: &C) -> RunHandle {
        let config = serde_json::to_value(config).unwrap_or_else(|err| {
            warn!(error = %err, "Run config is not serializable; recording null");
            Value::Null
        });

        let handle = RunHandle {
            backend: Arc::clone(&self.backend),
            record: RunRecord {
                run_id: Uuid::new_v4(),
                job_type: job_type.to_string(),
                config,
                started_at: Utc::now(),
                finished_at: None,
                status: RunStatus::Running,
                failure: None,
                used_artifacts: Vec::new(),
                logged_artifacts: Vec::new(),
            },
        };

        info!(run_id = %handle.record.run_id, job_type, "Started run");
        handle.flush().await;
        handle
    }
}

pub struct RunHandle {
    backend: Arc<dyn ObjectBackend>,
    record: RunRecord,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Marks an input artifact as consumed by this run.
    pub async fn use_artifact(&mut self, reference: &ArtifactReference) {
        self.record.used_artifacts.push(reference.to_string());
        self.flush().await;
    }

    pub async fn log_artifact(&mut self, reference: &ArtifactReference) {
        self.record.logged_artifacts.push(reference.to_string());
        self.flush().await;
    }

    pub async fn finish_success(mut self) -> RunRecord {
        self.record.status = RunStatus::Succeeded;
        self.record.finished_at = Some(Utc::now());
        self.flush().await;
        self.record
    }

    pub async fn finish_failure(mut self, err: &CleaningError) -> RunRecord {
        self.record.status = RunStatus::Failed;
        self.record.finished_at = Some(Utc::now());
        self.record.failure = Some(RunFailure {
            stage: err.stage().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.flush().await;
        self.record
    }

    async fn flush(&self) {
        let bytes = match serde_json::to_vec_pretty(&self.record) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(run_id = %self.record.run_id, error = %err, "Failed to encode run record");
                return;
            }
        };

        if let Err(err) = self
            .backend
            .put_object(&run_key(self.record.run_id), Bytes::from(bytes), "application/json")
            .await
        {
            warn!(run_id = %self.record.run_id, error = %err, "Failed to persist run record");
        }
    }
}
