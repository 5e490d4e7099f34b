//! File-backed run store: one JSON document per run under
//! `<root>/runs/`, reports under `<root>/reports/`.

use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{RunListing, RunRecord, RunStore, StoreError};

pub struct FsRunStore {
    runs_dir: PathBuf,
    reports_dir: PathBuf,
}

impl FsRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            runs_dir: root.join("runs"),
            reports_dir: root.join("reports"),
        }
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }

    fn report_path(&self, run_id: &str, kind: &str) -> PathBuf {
        self.reports_dir.join(format!("{run_id}.{kind}.json"))
    }
}

/// Write via a temp file and rename so readers never observe a torn
/// document.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await.map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl RunStore for FsRunStore {
    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.run_path(&record.run_id), &bytes).await?;
        debug!(run_id = %record.run_id, "run persisted");
        Ok(())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunListing>, StoreError> {
        let mut entries = match fs::read_dir(&self.runs_dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.runs_dir.clone(),
                    source,
                });
            }
        };

        let mut listings: Vec<RunListing> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            path: self.runs_dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(bytes) = read_optional(&path).await? else {
                continue;
            };
            let record: RunRecord =
                serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            listings.push(RunListing::from(&record));
        }

        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings.truncate(limit);
        Ok(listings)
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        let path = self.run_path(run_id);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(record))
    }

    async fn save_report(
        &self,
        run_id: &str,
        kind: &str,
        report: &Value,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(report)?;
        write_atomic(&self.report_path(run_id, kind), &bytes).await?;
        debug!(run_id, kind, "report persisted");
        Ok(())
    }

    async fn load_report(&self, run_id: &str, kind: &str) -> Result<Option<Value>, StoreError> {
        let path = self.report_path(run_id, kind);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        let report =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentState;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(run_id: &str, age_minutes: i64) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            objective: format!("objective for {run_id}"),
            ok: true,
            iterations: 1,
            final_answer: Some("answer".into()),
            state: AgentState::default(),
            steps: Vec::new(),
            total_tokens: 42,
            total_cost: 0.001,
            memory_used: vec!["earlier".into()],
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FsRunStore::new(tmp.path());

        let original = record("abc123", 0);
        store.save_run(&original).await.unwrap();

        let loaded = store.load_run("abc123").await.unwrap().expect("present");
        assert_eq!(loaded, original);
        assert!(store.load_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_is_recent_first_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let store = FsRunStore::new(tmp.path());

        store.save_run(&record("old", 30)).await.unwrap();
        store.save_run(&record("newest", 0)).await.unwrap();
        store.save_run(&record("middle", 10)).await.unwrap();

        let listings = store.list_runs(2).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].run_id, "newest");
        assert_eq!(listings[1].run_id, "middle");
    }

    #[tokio::test]
    async fn listing_empty_when_store_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let store = FsRunStore::new(tmp.path());
        assert!(store.list_runs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_run_replaces_existing_record() {
        let tmp = TempDir::new().unwrap();
        let store = FsRunStore::new(tmp.path());

        let mut rec = record("dup", 0);
        store.save_run(&rec).await.unwrap();
        rec.ok = false;
        store.save_run(&rec).await.unwrap();

        let loaded = store.load_run("dup").await.unwrap().expect("present");
        assert!(!loaded.ok);
        assert_eq!(store.list_runs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reports_round_trip_per_kind() {
        let tmp = TempDir::new().unwrap();
        let store = FsRunStore::new(tmp.path());

        let report = json!({"quality_score": 0.8});
        store.save_report("abc", "eval", &report).await.unwrap();

        assert_eq!(
            store.load_report("abc", "eval").await.unwrap(),
            Some(report)
        );
        assert!(store.load_report("abc", "judge").await.unwrap().is_none());
    }
}
