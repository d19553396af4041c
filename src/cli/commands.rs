use crate::cli::{GraphArgs, HistoryArgs, RunArgs, ValidateArgs};
use crate::core::dataset::TrialOutcome;
use crate::core::pipeline::runner::{execute_pipeline, RunOptions};
use crate::core::pipeline::schema::PipelineSpec;
use crate::core::pipeline::stage::StageRegistry;
use crate::core::pipeline::state::RunStatus;
use crate::core::pipeline::{dot, history};
use crate::core::stages;
use anyhow::{anyhow, Context};
use std::sync::Arc;

pub async fn run(args: RunArgs) -> crate::Result<()> {
    let source = Arc::new(TrialOutcome::new(&args.phase)?);
    let mut builder = StageRegistry::builder();
    stages::register_builtins(&mut builder, source);
    let registry = builder.build();

    let spec = stages::clinical_trial_pipeline()?;
    let options = RunOptions {
        workspace_root: args.path,
        retries_override: args.retries,
    };
    let run = execute_pipeline(&spec, &registry, &options).await?;

    println!("run {} ({})", run.run_id, run.status.as_str());
    for record in &run.stage_runs {
        let duration = record
            .duration_ms()
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<12} {:<16} attempts={} duration={}",
            record.stage_id,
            record.status.as_str(),
            record.attempts,
            duration
        );
        if let Some(error) = &record.error {
            println!("    error [{}]: {}", error.code, error.message);
        }
    }

    if run.status != RunStatus::Succeeded {
        return Err(anyhow!("pipeline run {} failed", run.run_id));
    }
    Ok(())
}

pub async fn validate(args: ValidateArgs) -> crate::Result<()> {
    let spec = load_spec(args.file.as_deref())?;
    spec.validate().context("pipeline validation failed")?;
    println!("pipeline '{}' is valid ({} stages)", spec.name, spec.stages.len());

    let warnings = dot::linearity_warnings(&spec);
    if spec.is_linear_chain() {
        println!("stage graph is a strict linear chain");
    }
    for warning in &warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}

pub async fn graph(args: GraphArgs) -> crate::Result<()> {
    let spec = load_spec(args.file.as_deref())?;
    spec.validate().context("pipeline validation failed")?;
    print!("{}", dot::pipeline_to_dot(&spec));
    Ok(())
}

pub async fn history(args: HistoryArgs) -> crate::Result<()> {
    let workspace_root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let summaries = history::list_runs(&workspace_root)?;
    if summaries.is_empty() {
        println!("no runs recorded under {}", workspace_root.display());
        return Ok(());
    }
    for summary in summaries.iter().take(args.limit) {
        println!(
            "{}  {}  {:<9}  {} stages  {}",
            summary.started_at.to_rfc3339(),
            summary.run_id,
            summary.status.as_str(),
            summary.stage_count,
            summary.pipeline
        );
    }
    Ok(())
}

fn load_spec(file: Option<&std::path::Path>) -> crate::Result<PipelineSpec> {
    match file {
        Some(path) => Ok(PipelineSpec::load_from_file(path)?),
        None => Ok(stages::clinical_trial_pipeline()?),
    }
}
