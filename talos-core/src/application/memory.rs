//! Similarity-based retrieval of prior runs, used as advisory planning
//! context.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::MemoryRecord;
use crate::infrastructure::store::{RunStore, StoreError};

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Token-set Jaccard similarity over lower-cased whitespace tokens. Two
/// empty token sets score 1.0; one empty and one not, 0.0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = token_set(a);
    let sb = token_set(b);
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    intersection as f64 / union as f64
}

pub struct MemoryRetriever {
    store: Arc<dyn RunStore>,
}

impl MemoryRetriever {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Scan up to `scan_limit` most-recent runs, score each objective
    /// against `objective` and return the top `k`, best first. Ties keep
    /// the store's recency order. Read-only: never mutates anything.
    pub async fn find_relevant(
        &self,
        objective: &str,
        k: usize,
        scan_limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let candidates = self.store.list_runs(scan_limit).await?;
        debug!(candidates = candidates.len(), "scoring prior runs against objective");

        let mut scored: Vec<(f64, String)> = candidates
            .iter()
            .map(|listing| (jaccard(objective, &listing.objective), listing.run_id.clone()))
            .collect();
        // Stable sort: equal scores preserve the recent-first scan order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut records = Vec::new();
        for (similarity, run_id) in scored.into_iter().take(k) {
            let Some(run) = self.store.load_run(&run_id).await? else {
                continue;
            };
            records.push(MemoryRecord {
                run_id,
                similarity,
                objective: run.objective,
                ok: run.ok,
                iterations: run.iterations,
                final_answer: run.final_answer,
            });
        }
        Ok(records)
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Render retrieved memories for the planning prompt.
pub fn format_memories(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return "(none)".to_string();
    }
    memories
        .iter()
        .map(|memory| {
            format!(
                "- run_id={} sim={:.3} ok={} iters={} objective={:?} final={:?}",
                memory.run_id,
                memory.similarity,
                memory.ok,
                memory.iterations,
                clip(&memory.objective, 80),
                clip(memory.final_answer.as_deref().unwrap_or(""), 160),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentState;
    use crate::infrastructure::store::{MemoryRunStore, RunRecord};
    use chrono::{Duration, Utc};

    #[test]
    fn jaccard_identical_objectives_score_one() {
        assert_eq!(jaccard("fix login bug", "fix login bug"), 1.0);
    }

    #[test]
    fn jaccard_disjoint_objectives_score_zero() {
        assert_eq!(jaccard("fix login bug", "deploy new server"), 0.0);
    }

    #[test]
    fn jaccard_empty_edge_cases() {
        assert_eq!(jaccard("", ""), 1.0);
        assert_eq!(jaccard("", "deploy"), 0.0);
        assert_eq!(jaccard("deploy", ""), 0.0);
    }

    #[test]
    fn jaccard_is_case_insensitive() {
        assert_eq!(jaccard("Fix Login BUG", "fix login bug"), 1.0);
    }

    fn record(run_id: &str, objective: &str, age_minutes: i64) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            objective: objective.to_string(),
            ok: true,
            iterations: 1,
            final_answer: Some(format!("answer from {run_id}")),
            state: AgentState::default(),
            steps: Vec::new(),
            total_tokens: 0,
            total_cost: 0.0,
            memory_used: Vec::new(),
        }
    }

    #[tokio::test]
    async fn best_match_comes_first_with_rehydrated_metadata() {
        let store = Arc::new(MemoryRunStore::new());
        store.save_run(&record("r1", "deploy new server", 30)).await.unwrap();
        store.save_run(&record("r2", "fix login bug", 20)).await.unwrap();
        store.save_run(&record("r3", "fix login timeout", 10)).await.unwrap();

        let retriever = MemoryRetriever::new(store);
        let memories = retriever.find_relevant("fix login bug", 2, 50).await.unwrap();

        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].run_id, "r2");
        assert_eq!(memories[0].similarity, 1.0);
        assert_eq!(memories[0].final_answer.as_deref(), Some("answer from r2"));
        assert_eq!(memories[1].run_id, "r3");
    }

    #[tokio::test]
    async fn ties_keep_recency_order() {
        let store = Arc::new(MemoryRunStore::new());
        store.save_run(&record("older", "unrelated thing", 30)).await.unwrap();
        store.save_run(&record("newer", "another unrelated", 5)).await.unwrap();

        let retriever = MemoryRetriever::new(store);
        let memories = retriever.find_relevant("fix login bug", 2, 50).await.unwrap();

        // Both score 0.0; the more recent run must come first.
        assert_eq!(memories[0].run_id, "newer");
        assert_eq!(memories[1].run_id, "older");
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let retriever = MemoryRetriever::new(Arc::new(MemoryRunStore::new()));
        let memories = retriever.find_relevant("anything", 3, 50).await.unwrap();
        assert!(memories.is_empty());
        assert_eq!(format_memories(&memories), "(none)");
    }

    #[test]
    fn formatting_clips_long_fields() {
        let memory = MemoryRecord {
            run_id: "r1".into(),
            similarity: 0.5,
            objective: "o".repeat(200),
            ok: false,
            iterations: 2,
            final_answer: Some("f".repeat(400)),
        };
        let rendered = format_memories(&[memory]);
        assert!(rendered.contains("sim=0.500"));
        assert!(rendered.len() < 400);
    }
}
