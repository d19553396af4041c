#![allow(clippy::result_large_err)] // Runner returns AppError to preserve full diagnostic context without boxing.

use crate::core::error::AppError;
use crate::core::pipeline::exchange::ExchangeStore;
use crate::core::pipeline::history;
use crate::core::pipeline::schema::{PipelineSpec, RetryPolicy};
use crate::core::pipeline::stage::{StageContext, StageRegistry};
use crate::core::pipeline::state::{summarize_error, PipelineRun, RunStatus, StageStatus};
use crate::core::types::ErrorCategory;
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

/// Optional overrides supplied by CLI flags.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Workspace root holding `.trialflow/state`. Defaults to the current
    /// directory when unset.
    pub workspace_root: Option<PathBuf>,
    /// Replace the retry budget of every stage for this run.
    pub retries_override: Option<u32>,
}

/// Execute a pipeline: stages run strictly sequentially in topological
/// order, each gated on all of its predecessors having succeeded.
///
/// A stage failure (after its retry budget is exhausted) marks the stage
/// failed and every transitive successor upstream-failed; stages that do
/// not depend on the failed stage still run. The returned run record is
/// `Failed` unless every stage succeeded. An `Err` is returned only for
/// infrastructure problems such as an invalid definition, an unregistered
/// stage, or run-record persistence failures.
pub async fn execute_pipeline(
    spec: &PipelineSpec,
    registry: &StageRegistry,
    options: &RunOptions,
) -> Result<PipelineRun, AppError> {
    spec.validate()?;
    let order = spec.execution_order()?;

    for stage_id in &order {
        if registry.get(stage_id).is_none() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("stage '{}' is not registered", stage_id),
            )
            .with_code("PIPE-RUN-003"));
        }
    }

    let workspace_root = match &options.workspace_root {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    let mut run = PipelineRun::begin(spec, &order)?;
    history::save_run(&workspace_root, &run)?;
    tracing::info!(
        pipeline = %spec.name,
        run_id = %run.run_id,
        stages = order.len(),
        "pipeline run started"
    );

    let exchange = ExchangeStore::new(run.run_id);

    for stage_id in &order {
        let stage_spec = spec.stage(stage_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("execution order references unknown stage {}", stage_id),
            )
        })?;

        let blocked = stage_spec.upstream.iter().any(|upstream| {
            run.stage_run(upstream)
                .map(|record| record.status != StageStatus::Succeeded)
                .unwrap_or(true)
        });
        if blocked {
            let record = run.stage_run_mut(stage_id)?;
            record.status = StageStatus::UpstreamFailed;
            record.completed_at = Some(Utc::now());
            tracing::warn!(stage = %stage_id, "stage blocked: upstream did not succeed");
            history::save_run(&workspace_root, &run)?;
            continue;
        }

        let mut policy = stage_spec.retry_policy(&spec.default_retry);
        if let Some(retries) = options.retries_override {
            policy.retries = retries;
        }

        let stage = registry.get(stage_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("stage '{}' disappeared from the registry", stage_id),
            )
        })?;

        run_stage(&mut run, stage_id, stage.as_ref(), &policy, &exchange).await?;
        history::save_run(&workspace_root, &run)?;
    }

    run.exchanged = exchange.entries()?;
    run.status = if run
        .stage_runs
        .iter()
        .all(|record| record.status == StageStatus::Succeeded)
    {
        RunStatus::Succeeded
    } else {
        RunStatus::Failed
    };
    run.completed_at = Some(Utc::now());
    history::save_run(&workspace_root, &run)?;
    tracing::info!(
        pipeline = %spec.name,
        run_id = %run.run_id,
        status = run.status.as_str(),
        "pipeline run finished"
    );
    Ok(run)
}

async fn run_stage(
    run: &mut PipelineRun,
    stage_id: &str,
    stage: &dyn crate::core::pipeline::stage::Stage,
    policy: &RetryPolicy,
    exchange: &crate::core::pipeline::exchange::ExchangeHandle,
) -> Result<(), AppError> {
    let max_attempts = policy.max_attempts();
    {
        let record = run.stage_run_mut(stage_id)?;
        record.started_at = Some(Utc::now());
    }

    for attempt in 1..=max_attempts {
        {
            let record = run.stage_run_mut(stage_id)?;
            record.status = StageStatus::Running;
            record.attempts = attempt;
        }
        tracing::info!(stage = %stage_id, attempt, max_attempts, "stage running");

        let ctx = StageContext::new(run.run_id, stage_id.to_string(), attempt, exchange.clone());
        match stage.run(ctx).await {
            Ok(()) => {
                let record = run.stage_run_mut(stage_id)?;
                record.status = StageStatus::Succeeded;
                record.completed_at = Some(Utc::now());
                tracing::info!(stage = %stage_id, attempt, "stage succeeded");
                return Ok(());
            }
            Err(err) => {
                if attempt < max_attempts {
                    let record = run.stage_run_mut(stage_id)?;
                    record.status = StageStatus::FailedRetrying;
                    tracing::warn!(
                        stage = %stage_id,
                        attempt,
                        error = %err,
                        "stage failed, retrying"
                    );
                    let jitter = if policy.jitter_ms > 0 {
                        rand::thread_rng().gen_range(0..=policy.jitter_ms)
                    } else {
                        0
                    };
                    let backoff = policy.backoff_ms.saturating_add(jitter);
                    if backoff > 0 {
                        sleep(Duration::from_millis(backoff)).await;
                    }
                } else {
                    let record = run.stage_run_mut(stage_id)?;
                    record.status = StageStatus::Failed;
                    record.completed_at = Some(Utc::now());
                    record.error = Some(summarize_error(&err));
                    tracing::error!(
                        stage = %stage_id,
                        attempt,
                        error = %err,
                        "stage failed, retry budget exhausted"
                    );
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}
