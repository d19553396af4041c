//! Built-in stages for the clinical-trial ETL pipeline.

pub mod extract;
pub mod load;
pub mod transform;

use crate::core::dataset::DatasetSource;
use crate::core::error::AppError;
use crate::core::pipeline::schema::{PipelineSpec, RetryPolicy, StageSpec};
use crate::core::pipeline::stage::StageRegistryBuilder;
use std::sync::Arc;

/// Stage ids referenced by the pipeline definition and by exchange pulls.
pub const EXTRACT_STAGE_ID: &str = "extract";
pub const TRANSFORM_STAGE_ID: &str = "transform";
pub const LOAD_STAGE_ID: &str = "load";

/// Exchange key the training split is published under by Extract.
pub const ORDER_DATA_KEY: &str = "order_data";
/// Exchange key the derived summary is published under by Transform.
pub const TOTAL_ORDER_VALUE_KEY: &str = "total_order_value";

/// Default dataset partition fetched by Extract.
pub const DEFAULT_TRIAL_PHASE: &str = "phase1";

/// Register the built-in ETL stages against the given dataset source.
pub fn register_builtins(builder: &mut StageRegistryBuilder, source: Arc<dyn DatasetSource>) {
    builder
        .register(extract::ExtractStage::new(source))
        .register(transform::TransformStage::new())
        .register(load::LoadStage::new());
}

/// The clinical-trial pipeline definition: a manual-only, no-catchup run of
/// extract -> transform -> load with a 2-retry budget per stage, tagged
/// `example`.
pub fn clinical_trial_pipeline() -> Result<PipelineSpec, AppError> {
    PipelineSpec::builder("dag_clinical_trial")
        .description("Extract -> Transform -> Load pipeline over clinical trial outcomes")
        .tag("example")
        .default_retry(RetryPolicy {
            retries: 2,
            backoff_ms: 200,
            jitter_ms: 50,
        })
        .stage(StageSpec::new(EXTRACT_STAGE_ID).with_doc(
            "#### Extract stage\n\
             Fetches the configured phase partition of the trial outcome dataset, \
             selects the training split, and publishes it to the exchange store \
             so the next stage can process it.",
        ))
        .stage(StageSpec::new(TRANSFORM_STAGE_ID).with_doc(
            "#### Transform stage\n\
             Takes the collection of trial records from the exchange store and \
             computes the total order value summary. The computed summary is \
             published for the next stage.",
        ))
        .stage(StageSpec::new(LOAD_STAGE_ID).with_doc(
            "#### Load stage\n\
             Takes the result of the Transform stage from the exchange store and, \
             instead of saving it for end user review, just logs it.",
        ))
        .chain(&[EXTRACT_STAGE_ID, TRANSFORM_STAGE_ID, LOAD_STAGE_ID])
        .build()
}
