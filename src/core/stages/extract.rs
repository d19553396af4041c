use crate::core::dataset::DatasetSource;
use crate::core::error::AppError;
use crate::core::pipeline::stage::{Stage, StageContext};
use crate::core::stages::ORDER_DATA_KEY;
use async_trait::async_trait;
use std::sync::Arc;

/// Extract stage: fetches the fixed dataset partition, selects the training
/// split, and publishes it under `order_data` for downstream consumption.
///
/// Takes no external input. Dataset errors propagate to the runner, which
/// applies the configured retry budget before marking the stage failed.
pub struct ExtractStage {
    source: Arc<dyn DatasetSource>,
}

impl ExtractStage {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        ExtractStage { source }
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn id(&self) -> &'static str {
        crate::core::stages::EXTRACT_STAGE_ID
    }

    fn doc(&self) -> &'static str {
        "Fetch the trial outcome training split and publish it as order_data."
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        let split = self.source.get_split()?;
        tracing::info!(
            partition = self.source.name(),
            records = split.train.len(),
            "extract selected training split"
        );
        ctx.publish(ORDER_DATA_KEY, serde_json::to_value(&split.train)?)
    }
}
