mod fs;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{AgentState, StepExecution};

pub use fs::FsRunStore;
pub use memory::MemoryRunStore;

/// Full persisted record of one agent run. Saved once, at run end, under
/// its `run_id` with insert-or-replace semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub objective: String,
    pub ok: bool,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    pub state: AgentState,
    pub steps: Vec<StepExecution>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub memory_used: Vec<String>,
}

/// Slim row used by listings and memory retrieval scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunListing {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub objective: String,
    pub ok: bool,
    pub iterations: u32,
    pub total_tokens: u64,
    pub total_cost: f64,
}

impl From<&RunRecord> for RunListing {
    fn from(record: &RunRecord) -> Self {
        Self {
            run_id: record.run_id.clone(),
            created_at: record.created_at,
            objective: record.objective.clone(),
            ok: record.ok,
            iterations: record.iterations,
            total_tokens: record.total_tokens,
            total_cost: record.total_cost,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io failure at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored record at {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("record could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable run persistence. Shared across runs; a single key's
/// insert-or-replace is as atomic as the backing medium makes it, and no
/// cross-run coordination is attempted.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// Most-recent-first, at most `limit` rows.
    async fn list_runs(&self, limit: usize) -> Result<Vec<RunListing>, StoreError>;

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError>;

    /// Attach an evaluation report (e.g. kind `"eval"` or `"judge"`) to a
    /// run. Reports are opaque JSON to the store.
    async fn save_report(&self, run_id: &str, kind: &str, report: &Value)
    -> Result<(), StoreError>;

    async fn load_report(&self, run_id: &str, kind: &str) -> Result<Option<Value>, StoreError>;
}
