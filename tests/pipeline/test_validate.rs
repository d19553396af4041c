use std::io::Write;
use tempfile::NamedTempFile;
use trialflow::core::pipeline::schema::{PipelineSpec, RetryPolicy, Schedule, StageSpec};

const YAML_PIPELINE: &str = r#"
name: yaml_pipeline
tags:
  - example
stages:
  - id: extract
  - id: transform
    upstream: [extract]
  - id: load
    upstream: [transform]
"#;

fn write_pipeline(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", yaml).unwrap();
    file
}

#[test]
fn empty_pipeline_is_rejected() {
    let err = PipelineSpec::builder("empty")
        .build()
        .expect_err("empty pipeline must fail validation");
    assert_eq!(err.code, "PIPE-VAL-001");
}

#[test]
fn duplicate_stage_ids_are_rejected() {
    let err = PipelineSpec::builder("dupes")
        .stage(StageSpec::new("extract"))
        .stage(StageSpec::new("extract"))
        .build()
        .expect_err("duplicate ids must fail validation");
    assert_eq!(err.code, "PIPE-VAL-002");
}

#[test]
fn unknown_upstream_is_rejected() {
    let err = PipelineSpec::builder("dangling")
        .stage(StageSpec::new("transform").with_upstream(&["extract"]))
        .build()
        .expect_err("unknown upstream must fail validation");
    assert_eq!(err.code, "PIPE-VAL-003");
}

#[test]
fn self_dependency_is_rejected() {
    let err = PipelineSpec::builder("selfloop")
        .stage(StageSpec::new("extract").with_upstream(&["extract"]))
        .build()
        .expect_err("self dependency must fail validation");
    assert_eq!(err.code, "PIPE-VAL-004");
}

#[test]
fn invalid_stage_id_characters_are_rejected() {
    let err = PipelineSpec::builder("badid")
        .stage(StageSpec::new("ex/tract"))
        .build()
        .expect_err("slash in stage id must fail validation");
    assert_eq!(err.code, "PIPE-VAL-005");
}

#[test]
fn dependency_cycle_is_rejected() {
    let err = PipelineSpec::builder("cycle")
        .stage(StageSpec::new("a").with_upstream(&["b"]))
        .stage(StageSpec::new("b").with_upstream(&["a"]))
        .build()
        .expect_err("cycle must fail validation");
    assert_eq!(err.code, "PIPE-VAL-006");
}

#[test]
fn execution_order_respects_upstream_links() {
    // Declared out of order on purpose; upstream links decide placement.
    let spec = PipelineSpec::builder("shuffled")
        .stage(StageSpec::new("load").with_upstream(&["transform"]))
        .stage(StageSpec::new("transform").with_upstream(&["extract"]))
        .stage(StageSpec::new("extract"))
        .build()
        .expect("valid pipeline");
    assert_eq!(
        spec.execution_order().unwrap(),
        vec!["extract", "transform", "load"]
    );
}

#[test]
fn yaml_pipeline_loads_and_validates() {
    let file = write_pipeline(YAML_PIPELINE);
    let spec = PipelineSpec::load_from_file(file.path()).expect("valid yaml pipeline");
    assert_eq!(spec.name, "yaml_pipeline");
    assert_eq!(spec.tags, vec!["example"]);
    assert_eq!(spec.schedule, Schedule::Manual);
    assert!(!spec.catchup);
    assert_eq!(spec.default_retry, RetryPolicy::default());
    assert!(spec.is_linear_chain());
}

#[test]
fn yaml_with_unknown_upstream_fails_to_load() {
    let file = write_pipeline(
        r#"
name: broken
stages:
  - id: transform
    upstream: [extract]
"#,
    );
    let err = PipelineSpec::load_from_file(file.path()).expect_err("invalid pipeline");
    assert_eq!(err.code, "PIPE-VAL-003");
}

#[test]
fn malformed_yaml_fails_to_load() {
    let file = write_pipeline("name: [unclosed");
    let err = PipelineSpec::load_from_file(file.path()).expect_err("parse failure");
    assert!(err.message.contains("failed to parse"));
}
