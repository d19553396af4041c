#![allow(clippy::result_large_err)] // Stage trait and registry return AppError directly for structured diagnostics without boxing.

use crate::core::error::AppError;
use crate::core::pipeline::exchange::ExchangeHandle;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Execution context handed to a stage for one attempt.
///
/// The run-scoped exchange store is reached only through this handle, so a
/// stage never touches ambient global state.
#[derive(Clone)]
pub struct StageContext {
    pub run_id: Uuid,
    pub stage_id: String,
    /// 1-based attempt number within the stage's retry budget.
    pub attempt: u32,
    exchange: ExchangeHandle,
}

impl StageContext {
    pub fn new(run_id: Uuid, stage_id: String, attempt: u32, exchange: ExchangeHandle) -> Self {
        StageContext {
            run_id,
            stage_id,
            attempt,
            exchange,
        }
    }

    /// Publish a value keyed by this stage's own id. Write-once per key.
    pub fn publish(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.exchange.publish(&self.stage_id, key, value)
    }

    /// Read a value published by an upstream stage.
    pub fn pull(&self, stage_id: &str, key: &str) -> Result<Value, AppError> {
        self.exchange.pull(stage_id, key)
    }
}

/// Trait implemented by pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Stage id referenced by the pipeline definition.
    fn id(&self) -> &'static str;

    /// Human-readable documentation for the stage.
    fn doc(&self) -> &'static str {
        ""
    }

    /// Execute one attempt of the stage.
    async fn run(&self, ctx: StageContext) -> Result<(), AppError>;
}

/// Builder used to register stages before execution.
pub struct StageRegistryBuilder {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl Default for StageRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistryBuilder {
    pub fn new() -> Self {
        StageRegistryBuilder {
            stages: HashMap::new(),
        }
    }

    pub fn register<T: Stage>(&mut self, stage: T) -> &mut Self {
        let id = stage.id();
        if self.stages.contains_key(id) {
            panic!("duplicate stage registered: {}", id);
        }
        self.stages.insert(id.to_string(), Arc::new(stage));
        self
    }

    pub fn build(self) -> StageRegistry {
        StageRegistry {
            inner: Arc::new(self.stages),
        }
    }
}

/// Immutable registry available during pipeline execution.
#[derive(Clone)]
pub struct StageRegistry {
    inner: Arc<HashMap<String, Arc<dyn Stage>>>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        StageRegistryBuilder::new().build()
    }

    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::new()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Stage>> {
        self.inner.get(id).cloned()
    }
}
