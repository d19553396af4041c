use crate::core::error::AppError;
use crate::core::pipeline::stage::{Stage, StageContext};
use crate::core::stages::{TOTAL_ORDER_VALUE_KEY, TRANSFORM_STAGE_ID};
use async_trait::async_trait;

/// Load stage: terminal. Reads `total_order_value` published by Transform
/// and logs it; no further output, no successor.
pub struct LoadStage;

impl Default for LoadStage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStage {
    pub fn new() -> Self {
        LoadStage
    }
}

#[async_trait]
impl Stage for LoadStage {
    fn id(&self) -> &'static str {
        crate::core::stages::LOAD_STAGE_ID
    }

    fn doc(&self) -> &'static str {
        "Log the transform summary instead of saving it for end user review."
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        let total_order_value = ctx.pull(TRANSFORM_STAGE_ID, TOTAL_ORDER_VALUE_KEY)?;
        tracing::info!(%total_order_value, "load received summary");
        Ok(())
    }
}
