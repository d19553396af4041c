//! Clinical-trial-outcome dataset access.
//!
//! The pipeline treats the dataset library as an opaque external collaborator:
//! a named dataset partition exposing train/test/valid splits. The bundled
//! `TrialOutcome` source is deterministic for a fixed partition name so that
//! re-running Extract always publishes the same split.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Partition names accepted by [`TrialOutcome::new`].
pub const TRIAL_PHASES: [&str; 3] = ["phase1", "phase2", "phase3"];

/// One clinical trial outcome record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_id: String,
    pub drug: String,
    pub condition: String,
    pub enrollment: u32,
    pub approved: bool,
}

/// Train/test/valid partitioning of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: Vec<TrialRecord>,
    pub test: Vec<TrialRecord>,
    pub valid: Vec<TrialRecord>,
}

/// Errors surfaced by dataset sources.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("unknown trial phase partition '{0}'")]
    UnknownPartition(String),
    #[error("dataset '{0}' is unavailable: {1}")]
    Unavailable(String, String),
}

/// External-collaborator seam for dataset access.
pub trait DatasetSource: Send + Sync + 'static {
    /// Name of the dataset partition this source serves.
    fn name(&self) -> &str;

    /// Return the train/test/valid split for the partition.
    fn get_split(&self) -> Result<DatasetSplit, DatasetError>;
}

/// Trial outcome dataset keyed by phase partition name.
#[derive(Debug)]
pub struct TrialOutcome {
    partition: String,
}

impl TrialOutcome {
    pub fn new(partition: &str) -> Result<Self, DatasetError> {
        if !TRIAL_PHASES.contains(&partition) {
            return Err(DatasetError::UnknownPartition(partition.to_string()));
        }
        Ok(TrialOutcome {
            partition: partition.to_string(),
        })
    }
}

impl DatasetSource for TrialOutcome {
    fn name(&self) -> &str {
        &self.partition
    }

    fn get_split(&self) -> Result<DatasetSplit, DatasetError> {
        let phase = TRIAL_PHASES
            .iter()
            .position(|p| *p == self.partition)
            .ok_or_else(|| DatasetError::UnknownPartition(self.partition.clone()))? as u32
            + 1;
        Ok(DatasetSplit {
            train: build_records(phase, 0, 12),
            test: build_records(phase, 12, 4),
            valid: build_records(phase, 16, 4),
        })
    }
}

const DRUGS: [&str; 6] = [
    "lenvatinib",
    "osimertinib",
    "pembrolizumab",
    "semaglutide",
    "tofacitinib",
    "vorasidenib",
];

const CONDITIONS: [&str; 4] = [
    "hepatocellular carcinoma",
    "non-small cell lung cancer",
    "rheumatoid arthritis",
    "type 2 diabetes",
];

/// Build a fixed block of records. Every field is a pure function of the
/// phase number and record index, which keeps splits stable across runs.
fn build_records(phase: u32, offset: u32, count: u32) -> Vec<TrialRecord> {
    (offset..offset + count)
        .map(|idx| TrialRecord {
            trial_id: format!("NCT-P{}-{:04}", phase, idx + 1),
            drug: DRUGS[(idx as usize + phase as usize) % DRUGS.len()].to_string(),
            condition: CONDITIONS[idx as usize % CONDITIONS.len()].to_string(),
            enrollment: 40 + phase * 25 + idx * 7,
            approved: (idx + phase) % 3 != 0,
        })
        .collect()
}
