use crate::core::stages::DEFAULT_TRIAL_PHASE;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Workspace root holding .trialflow state (default: current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Dataset partition to extract (phase1, phase2, or phase3)
    #[arg(long, default_value = DEFAULT_TRIAL_PHASE, value_name = "PHASE")]
    pub phase: String,

    /// Override the retry budget of every stage for this run
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Validate a YAML pipeline description instead of the built-in pipeline
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Render a YAML pipeline description instead of the built-in pipeline
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Workspace root holding .trialflow state (default: current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Show at most this many runs
    #[arg(long, default_value = "20")]
    pub limit: usize,
}
