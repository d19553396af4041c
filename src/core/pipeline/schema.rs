#![allow(clippy::result_large_err)] // Schema APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

fn default_tags() -> Vec<String> {
    Vec::new()
}

fn default_upstream() -> Vec<String> {
    Vec::new()
}

/// How a pipeline run is triggered. Only manual invocation is supported;
/// there is no periodic schedule and no backfill of missed past runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    #[default]
    Manual,
}

/// Retry configuration applied per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub retries: u32,
    pub backoff_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 0,
            backoff_ms: 200,
            jitter_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Total attempt budget: the first attempt plus every retry.
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// One unit of work in the pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub id: String,
    /// Human-readable documentation shown by `graph` and `validate`.
    #[serde(default)]
    pub doc: Option<String>,
    /// Ordered predecessor list. Every listed stage must succeed before
    /// this stage may execute.
    #[serde(default = "default_upstream")]
    pub upstream: Vec<String>,
    /// Per-stage override of the pipeline default retry policy.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

impl StageSpec {
    pub fn new(id: &str) -> Self {
        StageSpec {
            id: id.to_string(),
            doc: None,
            upstream: Vec::new(),
            retry: None,
        }
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn with_upstream(mut self, upstream: &[&str]) -> Self {
        self.upstream = upstream.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Effective retry policy, falling back to the pipeline default.
    pub fn retry_policy(&self, default: &RetryPolicy) -> RetryPolicy {
        self.retry.clone().unwrap_or_else(|| default.clone())
    }
}

/// Pipeline definition registered with the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub schedule: Schedule,
    /// Whether missed past runs would be backfilled. Always false here;
    /// kept in the definition so run records state it explicitly.
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub default_retry: RetryPolicy,
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub fn builder(name: &str) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    /// Load and validate a pipeline description from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        let spec: PipelineSpec = serde_yaml::from_str(&text).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("failed to parse {}: {}", path.display(), err),
            )
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Validate the pipeline definition: unique filesystem-safe stage ids,
    /// known upstream references, and an acyclic dependency graph.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.stages.is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "pipeline must define at least one stage",
            )
            .with_code("PIPE-VAL-001"));
        }

        let mut ids = HashSet::new();
        for stage in &self.stages {
            validate_stage_id(&stage.id)?;
            if !ids.insert(stage.id.clone()) {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("duplicate stage id: {}", stage.id),
                )
                .with_code("PIPE-VAL-002"));
            }
        }

        for stage in &self.stages {
            for upstream in &stage.upstream {
                if !ids.contains(upstream) {
                    return Err(AppError::new(
                        ErrorCategory::ValidationError,
                        format!(
                            "stage {} references unknown upstream stage: {}",
                            stage.id, upstream
                        ),
                    )
                    .with_code("PIPE-VAL-003"));
                }
                if upstream == &stage.id {
                    return Err(AppError::new(
                        ErrorCategory::ValidationError,
                        format!("stage {} depends on itself", stage.id),
                    )
                    .with_code("PIPE-VAL-004"));
                }
            }
        }

        let (graph, _) = build_stage_graph(self);
        toposort(&graph, None).map_err(|cycle| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!(
                    "pipeline dependency graph contains a cycle through stage {}",
                    graph[cycle.node_id()]
                ),
            )
            .with_code("PIPE-VAL-006")
        })?;
        Ok(())
    }

    /// Deterministic execution order: topological, breaking ties by
    /// declaration order so runs are reproducible.
    pub fn execution_order(&self) -> Result<Vec<String>, AppError> {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.stages.len());
        while order.len() < self.stages.len() {
            let before = order.len();
            for stage in &self.stages {
                if placed.contains(stage.id.as_str()) {
                    continue;
                }
                if stage
                    .upstream
                    .iter()
                    .all(|upstream| placed.contains(upstream.as_str()))
                {
                    placed.insert(stage.id.as_str());
                    order.push(stage.id.clone());
                }
            }
            if order.len() == before {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    "pipeline dependency graph contains a cycle",
                )
                .with_code("PIPE-VAL-006"));
            }
        }
        Ok(order)
    }

    /// Whether the pipeline forms a strict linear chain: exactly one root,
    /// every stage has at most one predecessor and one successor.
    pub fn is_linear_chain(&self) -> bool {
        let mut successor_counts: HashMap<&str, usize> = HashMap::new();
        let mut roots = 0usize;
        for stage in &self.stages {
            if stage.upstream.is_empty() {
                roots += 1;
            }
            if stage.upstream.len() > 1 {
                return false;
            }
            for upstream in &stage.upstream {
                *successor_counts.entry(upstream.as_str()).or_insert(0) += 1;
            }
        }
        roots == 1 && successor_counts.values().all(|count| *count <= 1)
    }
}

/// Builder used to assemble a pipeline definition in code.
pub struct PipelineBuilder {
    spec: PipelineSpec,
}

impl PipelineBuilder {
    pub fn new(name: &str) -> Self {
        PipelineBuilder {
            spec: PipelineSpec {
                name: name.to_string(),
                description: None,
                tags: Vec::new(),
                schedule: Schedule::Manual,
                catchup: false,
                default_retry: RetryPolicy::default(),
                stages: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.spec.description = Some(description.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.spec.tags.push(tag.to_string());
        self
    }

    pub fn default_retry(mut self, retry: RetryPolicy) -> Self {
        self.spec.default_retry = retry;
        self
    }

    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.spec.stages.push(stage);
        self
    }

    /// Wire the listed stages into a strict chain, each depending on the
    /// previous one. Replaces any upstream links already declared on them.
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for pair in ids.windows(2) {
            if let Some(stage) = self
                .spec
                .stages
                .iter_mut()
                .find(|stage| stage.id == pair[1])
            {
                stage.upstream = vec![pair[0].to_string()];
            }
        }
        self
    }

    pub fn build(self) -> Result<PipelineSpec, AppError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

/// Build a petgraph view of the stage dependency graph.
pub fn build_stage_graph(spec: &PipelineSpec) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index_by_id: HashMap<String, NodeIndex> = HashMap::new();
    for stage in &spec.stages {
        let idx = graph.add_node(stage.id.clone());
        index_by_id.insert(stage.id.clone(), idx);
    }
    for stage in &spec.stages {
        if let Some(&to) = index_by_id.get(&stage.id) {
            for upstream in &stage.upstream {
                if let Some(&from) = index_by_id.get(upstream) {
                    graph.add_edge(from, to, ());
                }
            }
        }
    }
    (graph, index_by_id)
}

/// Determine if a stage id is valid for filesystem paths and log fields.
pub fn validate_stage_id(stage_id: &str) -> Result<(), AppError> {
    if stage_id.is_empty()
        || !stage_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("stage id '{}' contains invalid characters", stage_id),
        )
        .with_code("PIPE-VAL-005"));
    }
    Ok(())
}
