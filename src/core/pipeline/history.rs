#![allow(clippy::result_large_err)] // History module returns AppError to preserve structured diagnostic context without boxing.

use crate::core::error::AppError;
use crate::core::pipeline::state::{PipelineRun, RunStatus};
use crate::core::types::ErrorCategory;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Paths under `.trialflow/state/runs/<run_id>`.
pub struct RunStatePaths {
    pub run_dir: PathBuf,
    pub run_file: PathBuf,
}

impl RunStatePaths {
    pub fn new(workspace_root: &Path, run_id: &Uuid) -> Self {
        let run_dir = runs_root(workspace_root).join(run_id.to_string());
        let run_file = run_dir.join("run.json");
        RunStatePaths { run_dir, run_file }
    }
}

pub fn runs_root(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".trialflow/state/runs")
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
    })?;
    Ok(())
}

pub fn save_run(workspace_root: &Path, run: &PipelineRun) -> Result<(), AppError> {
    let paths = RunStatePaths::new(workspace_root, &run.run_id);
    let content = serde_json::to_vec_pretty(run).map_err(|err| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("failed to serialize run.json: {}", err),
        )
    })?;
    atomic_write(&paths.run_file, &content)
}

pub fn load_run(workspace_root: &Path, run_id: &Uuid) -> Result<PipelineRun, AppError> {
    let paths = RunStatePaths::new(workspace_root, run_id);
    let bytes = fs::read(&paths.run_file).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", paths.run_file.display(), err),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("failed to deserialize run.json: {}", err),
        )
    })
}

/// One line of `trialflow history` output.
pub struct RunSummary {
    pub run_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub stage_count: usize,
}

/// List persisted runs, most recent first.
pub fn list_runs(workspace_root: &Path) -> Result<Vec<RunSummary>, AppError> {
    let mut summaries = Vec::new();
    let base = runs_root(workspace_root);
    if !base.exists() {
        return Ok(summaries);
    }
    for entry in fs::read_dir(&base)
        .map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to list run state: {}", err),
            )
        })?
        .flatten()
    {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(run_id) = Uuid::parse_str(&entry.file_name().to_string_lossy()) {
            if let Ok(run) = load_run(workspace_root, &run_id) {
                summaries.push(RunSummary {
                    run_id,
                    pipeline: run.pipeline,
                    status: run.status,
                    started_at: run.started_at,
                    stage_count: run.stage_runs.len(),
                });
            }
        }
    }
    summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(summaries)
}
