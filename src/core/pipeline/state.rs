#![allow(clippy::result_large_err)] // State module returns AppError to preserve structured diagnostic context without boxing.

use crate::core::error::AppError;
use crate::core::pipeline::exchange::ExchangeEntry;
use crate::core::pipeline::schema::{PipelineSpec, Schedule};
use crate::core::types::ErrorCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Version embedded in persisted run record files.
pub const RUN_RECORD_FORMAT_VERSION: &str = "1";

/// Overall status of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

/// Per-stage lifecycle imposed by the runner:
/// queued -> running -> {succeeded | failed-retrying -> running | failed}.
/// A stage whose predecessors did not all succeed is marked upstream-failed
/// and never executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Queued,
    Running,
    Succeeded,
    FailedRetrying,
    Failed,
    UpstreamFailed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Queued => "queued",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::FailedRetrying => "failed_retrying",
            StageStatus::Failed => "failed",
            StageStatus::UpstreamFailed => "upstream_failed",
        }
    }

    /// Terminal states never transition again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Succeeded | StageStatus::Failed | StageStatus::UpstreamFailed
        )
    }
}

/// Simplified summary of errors persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub code: String,
    pub category: String,
    pub message: String,
}

/// Create a persistable summary of an AppError.
pub fn summarize_error(error: &AppError) -> ErrorSummary {
    ErrorSummary {
        code: error.code.clone(),
        category: format!("{:?}", error.category),
        message: error.message.clone(),
    }
}

/// Record of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRunRecord {
    pub stage_id: String,
    pub status: StageStatus,
    /// Attempts consumed, including the first. Zero when the stage never ran.
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorSummary>,
}

impl StageRunRecord {
    pub fn queued(stage_id: &str) -> Self {
        StageRunRecord {
            stage_id: stage_id.to_string(),
            status: StageStatus::Queued,
            attempts: 0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).num_milliseconds().max(0) as u64)
            }
            _ => None,
        }
    }
}

/// One execution instance of a pipeline, persisted as `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub format_version: String,
    pub run_id: Uuid,
    pub pipeline: String,
    /// SHA-256 of the canonical pipeline definition at run time.
    pub definition_hash: String,
    pub schedule: Schedule,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stage_runs: Vec<StageRunRecord>,
    /// Values moved through the exchange store, in publish order.
    #[serde(default)]
    pub exchanged: Vec<ExchangeEntry>,
}

impl PipelineRun {
    pub fn begin(spec: &PipelineSpec, order: &[String]) -> Result<Self, AppError> {
        Ok(PipelineRun {
            format_version: RUN_RECORD_FORMAT_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            pipeline: spec.name.clone(),
            definition_hash: definition_hash(spec)?,
            schedule: spec.schedule,
            tags: spec.tags.clone(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            stage_runs: order
                .iter()
                .map(|stage_id| StageRunRecord::queued(stage_id))
                .collect(),
            exchanged: Vec::new(),
        })
    }

    pub fn stage_run(&self, stage_id: &str) -> Option<&StageRunRecord> {
        self.stage_runs
            .iter()
            .find(|record| record.stage_id == stage_id)
    }

    pub fn stage_run_mut(&mut self, stage_id: &str) -> Result<&mut StageRunRecord, AppError> {
        self.stage_runs
            .iter_mut()
            .find(|record| record.stage_id == stage_id)
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("no stage run record for stage {}", stage_id),
                )
            })
    }
}

/// Compute the SHA-256 hash encoded as lowercase hex.
pub fn compute_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash the canonical JSON serialization of the pipeline definition so run
/// records pin the exact definition they executed.
pub fn definition_hash(spec: &PipelineSpec) -> Result<String, AppError> {
    let bytes = serde_json::to_vec(spec)?;
    Ok(compute_sha256_hex(&bytes))
}
