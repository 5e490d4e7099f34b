//! In-memory store for tests and ephemeral (throwaway) runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{RunListing, RunRecord, RunStore, StoreError};

#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<RunRecord>>,
    reports: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().await;
        runs.retain(|existing| existing.run_id != record.run_id);
        runs.push(record.clone());
        Ok(())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunListing>, StoreError> {
        let runs = self.runs.lock().await;
        let mut listings: Vec<RunListing> = runs.iter().map(RunListing::from).collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings.truncate(limit);
        Ok(listings)
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().find(|record| record.run_id == run_id).cloned())
    }

    async fn save_report(
        &self,
        run_id: &str,
        kind: &str,
        report: &Value,
    ) -> Result<(), StoreError> {
        let mut reports = self.reports.lock().await;
        reports.insert((run_id.to_string(), kind.to_string()), report.clone());
        Ok(())
    }

    async fn load_report(&self, run_id: &str, kind: &str) -> Result<Option<Value>, StoreError> {
        let reports = self.reports.lock().await;
        Ok(reports.get(&(run_id.to_string(), kind.to_string())).cloned())
    }
}
