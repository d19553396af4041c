use std::sync::Arc;
use trialflow::core::dataset::{DatasetSource, TrialOutcome};
use trialflow::core::pipeline::runner::{execute_pipeline, RunOptions};
use trialflow::core::pipeline::stage::StageRegistry;
use trialflow::core::pipeline::state::{definition_hash, RunStatus, StageStatus};
use trialflow::core::pipeline::{history, state::PipelineRun};
use trialflow::core::stages::{
    self, transform::TrialSummary, EXTRACT_STAGE_ID, LOAD_STAGE_ID, ORDER_DATA_KEY,
    TOTAL_ORDER_VALUE_KEY, TRANSFORM_STAGE_ID,
};

fn registry(phase: &str) -> StageRegistry {
    let source = Arc::new(TrialOutcome::new(phase).expect("known partition"));
    let mut builder = StageRegistry::builder();
    stages::register_builtins(&mut builder, source);
    builder.build()
}

async fn run_pipeline(dir: &tempfile::TempDir, phase: &str) -> PipelineRun {
    let spec = stages::clinical_trial_pipeline().unwrap();
    let options = RunOptions {
        workspace_root: Some(dir.path().to_path_buf()),
        retries_override: None,
    };
    execute_pipeline(&spec, &registry(phase), &options)
        .await
        .expect("pipeline run completes")
}

#[tokio::test]
async fn full_run_succeeds_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_pipeline(&dir, "phase1").await;

    assert_eq!(run.status, RunStatus::Succeeded);
    let ids: Vec<&str> = run
        .stage_runs
        .iter()
        .map(|record| record.stage_id.as_str())
        .collect();
    assert_eq!(ids, vec![EXTRACT_STAGE_ID, TRANSFORM_STAGE_ID, LOAD_STAGE_ID]);
    for record in &run.stage_runs {
        assert_eq!(record.status, StageStatus::Succeeded);
        assert_eq!(record.attempts, 1);
    }

    // Every stage completes before its successor starts.
    for pair in run.stage_runs.windows(2) {
        assert!(pair[0].completed_at.unwrap() <= pair[1].started_at.unwrap());
    }
}

#[tokio::test]
async fn each_key_is_published_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_pipeline(&dir, "phase1").await;

    assert_eq!(run.exchanged.len(), 2);
    assert_eq!(run.exchanged[0].stage_id, EXTRACT_STAGE_ID);
    assert_eq!(run.exchanged[0].key, ORDER_DATA_KEY);
    assert_eq!(run.exchanged[1].stage_id, TRANSFORM_STAGE_ID);
    assert_eq!(run.exchanged[1].key, TOTAL_ORDER_VALUE_KEY);
}

#[tokio::test]
async fn summary_is_derived_from_the_extracted_split() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_pipeline(&dir, "phase2").await;

    let split = TrialOutcome::new("phase2").unwrap().get_split().unwrap();
    let expected = TrialSummary::from_records(&split.train);

    let published: TrialSummary =
        serde_json::from_value(run.exchanged[1].value.clone()).expect("summary deserializes");
    assert_eq!(published, expected);
    assert_eq!(published.records, split.train.len());
}

#[tokio::test]
async fn extract_is_idempotent_for_a_fixed_partition() {
    let dir = tempfile::tempdir().unwrap();
    let first = run_pipeline(&dir, "phase1").await;
    let second = run_pipeline(&dir, "phase1").await;

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.exchanged[0].value, second.exchanged[0].value);
}

#[tokio::test]
async fn run_record_is_persisted_and_reloadable() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_pipeline(&dir, "phase1").await;

    let loaded = history::load_run(dir.path(), &run.run_id).expect("run record on disk");
    assert_eq!(loaded.pipeline, "dag_clinical_trial");
    assert_eq!(loaded.status, RunStatus::Succeeded);
    assert_eq!(loaded.tags, vec!["example"]);
    assert_eq!(loaded.stage_runs.len(), 3);
    assert_eq!(loaded.exchanged.len(), 2);

    let spec = stages::clinical_trial_pipeline().unwrap();
    assert_eq!(loaded.definition_hash, definition_hash(&spec).unwrap());
}
