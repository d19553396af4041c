#![allow(clippy::result_large_err)] // Exchange APIs return AppError to preserve structured diagnostic context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Key into the exchange store: a value is addressed by the stage that
/// produced it plus the key name it was published under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeKey {
    pub stage_id: String,
    pub key: String,
}

/// One published entry, in publish order, as recorded into the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub stage_id: String,
    pub key: String,
    pub value: Value,
}

/// Run-scoped key-value channel for passing values between stages.
///
/// Each key is written exactly once by its producing stage and read by the
/// consumer; a second publish or a read of an unpublished key is a hard
/// failure with no automatic recovery.
pub struct ExchangeStore {
    run_id: Uuid,
    entries: Mutex<IndexMap<ExchangeKey, Value>>,
}

/// Cloneable handle to the run-scoped store, passed to stages through
/// their execution context rather than held as ambient global state.
pub type ExchangeHandle = Arc<ExchangeStore>;

impl ExchangeStore {
    pub fn new(run_id: Uuid) -> ExchangeHandle {
        Arc::new(ExchangeStore {
            run_id,
            entries: Mutex::new(IndexMap::new()),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Publish a value under (producing stage, key). Write-once per key.
    pub fn publish(&self, stage_id: &str, key: &str, value: Value) -> Result<(), AppError> {
        let exchange_key = ExchangeKey {
            stage_id: stage_id.to_string(),
            key: key.to_string(),
        };
        let mut entries = self.lock()?;
        if entries.contains_key(&exchange_key) {
            return Err(AppError::new(
                ErrorCategory::ExchangeError,
                format!("value already published for stage {} key {}", stage_id, key),
            )
            .with_code("PIPE-EXCH-001"));
        }
        entries.insert(exchange_key, value);
        Ok(())
    }

    /// Read a value published by the given stage under the given key.
    pub fn pull(&self, stage_id: &str, key: &str) -> Result<Value, AppError> {
        let exchange_key = ExchangeKey {
            stage_id: stage_id.to_string(),
            key: key.to_string(),
        };
        let entries = self.lock()?;
        entries.get(&exchange_key).cloned().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ExchangeError,
                format!("no value published for stage {} key {}", stage_id, key),
            )
            .with_code("PIPE-EXCH-002")
        })
    }

    /// Snapshot of every published entry in publish order.
    pub fn entries(&self) -> Result<Vec<ExchangeEntry>, AppError> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .map(|(key, value)| ExchangeEntry {
                stage_id: key.stage_id.clone(),
                key: key.key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, IndexMap<ExchangeKey, Value>>, AppError> {
        self.entries.lock().map_err(|_| {
            AppError::new(
                ErrorCategory::InternalError,
                "exchange store lock poisoned",
            )
        })
    }
}
