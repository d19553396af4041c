use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use trialflow::core::error::AppError;
use trialflow::core::pipeline::runner::{execute_pipeline, RunOptions};
use trialflow::core::pipeline::schema::{PipelineSpec, RetryPolicy, StageSpec};
use trialflow::core::pipeline::stage::{Stage, StageContext, StageRegistry};
use trialflow::core::pipeline::state::{RunStatus, StageStatus};
use trialflow::core::types::ErrorCategory;

/// Records the order stages execute in.
struct ProbeStage {
    id: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Stage for ProbeStage {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        self.log.lock().unwrap().push(ctx.stage_id.clone());
        ctx.publish("out", json!(ctx.attempt))
    }
}

/// Fails the first `fail_times` attempts, then succeeds.
struct FlakyStage {
    id: &'static str,
    fail_times: u32,
    calls: AtomicU32,
}

impl FlakyStage {
    fn new(id: &'static str, fail_times: u32) -> Self {
        FlakyStage {
            id,
            fail_times,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Stage for FlakyStage {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_times {
            return Err(
                AppError::new(ErrorCategory::DatasetError, "dataset unavailable")
                    .with_code("PIPE-DATA-001"),
            );
        }
        ctx.publish("out", json!(call))
    }
}

/// Publishes the same key twice, violating write-once.
struct DoublePublishStage;

#[async_trait]
impl Stage for DoublePublishStage {
    fn id(&self) -> &'static str {
        "doubler"
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        ctx.publish("out", json!(1))?;
        ctx.publish("out", json!(2))
    }
}

fn fast_retry(retries: u32) -> RetryPolicy {
    RetryPolicy {
        retries,
        backoff_ms: 1,
        jitter_ms: 0,
    }
}

fn options(dir: &tempfile::TempDir) -> RunOptions {
    RunOptions {
        workspace_root: Some(dir.path().to_path_buf()),
        retries_override: None,
    }
}

#[tokio::test]
async fn stages_execute_in_chain_order() {
    let spec = PipelineSpec::builder("chain")
        .stage(StageSpec::new("extract"))
        .stage(StageSpec::new("transform"))
        .stage(StageSpec::new("load"))
        .chain(&["extract", "transform", "load"])
        .build()
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = StageRegistry::builder();
    for id in ["extract", "transform", "load"] {
        builder.register(ProbeStage {
            id,
            log: log.clone(),
        });
    }
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(*log.lock().unwrap(), vec!["extract", "transform", "load"]);
    assert!(run
        .stage_runs
        .iter()
        .all(|record| record.status == StageStatus::Succeeded && record.attempts == 1));
}

#[tokio::test]
async fn flaky_stage_succeeds_within_retry_budget() {
    let spec = PipelineSpec::builder("flaky")
        .default_retry(fast_retry(2))
        .stage(StageSpec::new("flaky"))
        .build()
        .unwrap();

    let mut builder = StageRegistry::builder();
    builder.register(FlakyStage::new("flaky", 2));
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Succeeded);
    let record = run.stage_run("flaky").unwrap();
    assert_eq!(record.status, StageStatus::Succeeded);
    assert_eq!(record.attempts, 3);
}

#[tokio::test]
async fn exhausted_retry_budget_fails_stage_and_blocks_successor() {
    let spec = PipelineSpec::builder("failing")
        .default_retry(fast_retry(2))
        .stage(StageSpec::new("flaky"))
        .stage(StageSpec::new("after").with_upstream(&["flaky"]))
        .build()
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = StageRegistry::builder();
    builder.register(FlakyStage::new("flaky", u32::MAX));
    builder.register(ProbeStage {
        id: "after",
        log: log.clone(),
    });
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Failed);
    let flaky = run.stage_run("flaky").unwrap();
    assert_eq!(flaky.status, StageStatus::Failed);
    assert_eq!(flaky.attempts, 3);
    assert_eq!(flaky.error.as_ref().unwrap().code, "PIPE-DATA-001");

    let after = run.stage_run("after").unwrap();
    assert_eq!(after.status, StageStatus::UpstreamFailed);
    assert_eq!(after.attempts, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failure_blocks_only_successors() {
    let spec = PipelineSpec::builder("partial")
        .stage(StageSpec::new("bad"))
        .stage(StageSpec::new("child").with_upstream(&["bad"]))
        .stage(StageSpec::new("independent"))
        .build()
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = StageRegistry::builder();
    builder.register(FlakyStage::new("bad", u32::MAX));
    builder.register(ProbeStage {
        id: "child",
        log: log.clone(),
    });
    builder.register(ProbeStage {
        id: "independent",
        log: log.clone(),
    });
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.stage_run("child").unwrap().status,
        StageStatus::UpstreamFailed
    );
    assert_eq!(
        run.stage_run("independent").unwrap().status,
        StageStatus::Succeeded
    );
    assert_eq!(*log.lock().unwrap(), vec!["independent"]);
}

#[tokio::test]
async fn per_stage_retry_policy_wins_over_default() {
    // Pipeline default grants no retries; the flaky stage carries its own
    // budget and must succeed on its third attempt.
    let spec = PipelineSpec::builder("tuned")
        .default_retry(fast_retry(0))
        .stage(StageSpec::new("flaky").with_retry(fast_retry(2)))
        .stage(StageSpec::new("steady").with_upstream(&["flaky"]))
        .build()
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = StageRegistry::builder();
    builder.register(FlakyStage::new("flaky", 2));
    builder.register(ProbeStage {
        id: "steady",
        log: log.clone(),
    });
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.stage_run("flaky").unwrap().attempts, 3);
    assert_eq!(run.stage_run("steady").unwrap().attempts, 1);
}

#[tokio::test]
async fn retries_override_replaces_stage_budget() {
    let spec = PipelineSpec::builder("override")
        .default_retry(fast_retry(0))
        .stage(StageSpec::new("flaky"))
        .build()
        .unwrap();

    let mut builder = StageRegistry::builder();
    builder.register(FlakyStage::new("flaky", 1));
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(&dir);
    opts.retries_override = Some(2);
    let run = execute_pipeline(&spec, &registry, &opts)
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.stage_run("flaky").unwrap().attempts, 2);
}

#[tokio::test]
async fn unregistered_stage_is_an_error() {
    let spec = PipelineSpec::builder("missing")
        .stage(StageSpec::new("ghost"))
        .build()
        .unwrap();
    let registry = StageRegistry::new();

    let dir = tempfile::tempdir().unwrap();
    let err = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect_err("unregistered stage");
    assert_eq!(err.code, "PIPE-RUN-003");
}

#[tokio::test]
async fn duplicate_publish_fails_the_stage() {
    let spec = PipelineSpec::builder("double")
        .stage(StageSpec::new("doubler"))
        .build()
        .unwrap();

    let mut builder = StageRegistry::builder();
    builder.register(DoublePublishStage);
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let run = execute_pipeline(&spec, &registry, &options(&dir))
        .await
        .expect("run completes");

    assert_eq!(run.status, RunStatus::Failed);
    let record = run.stage_run("doubler").unwrap();
    assert_eq!(record.status, StageStatus::Failed);
    assert_eq!(record.error.as_ref().unwrap().code, "PIPE-EXCH-001");
}
