//! Deterministic run scoring. No model call; a cheap regression signal
//! that can run on every persisted record.

use serde::{Deserialize, Serialize};

use crate::application::memory::jaccard;
use crate::infrastructure::store::RunRecord;

/// Report kind under which heuristic scores are stored.
pub const EVAL_REPORT_KIND: &str = "eval";

pub const DEFAULT_COST_BUDGET: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub run_id: String,
    pub quality_score: f64,
    pub structure_score: f64,
    pub cost_score: f64,
    pub stability_score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

pub fn evaluate_run(record: &RunRecord, cost_budget: f64) -> EvalReport {
    let final_answer = record.final_answer.as_deref().unwrap_or("");
    let mut reasons: Vec<String> = Vec::new();

    // Quality: term overlap between objective and answer (cheap proxy).
    let quality = jaccard(&record.objective, final_answer);
    if quality < 0.2 {
        reasons.push("Low objective/answer overlap (quality proxy).".to_string());
    }

    let structure = if final_answer.trim().is_empty() {
        reasons.push("Missing final_answer.".to_string());
        0.0
    } else if final_answer.trim().len() < 20 {
        reasons.push("final_answer is very short.".to_string());
        0.4
    } else {
        1.0
    };

    // Cost: full marks at or under budget, linear penalty beyond it.
    let cost_score = if cost_budget <= 0.0 {
        1.0
    } else {
        let ratio = record.total_cost / cost_budget;
        if record.total_cost > cost_budget {
            reasons.push(format!(
                "Cost {:.4} exceeds budget {:.4}.",
                record.total_cost, cost_budget
            ));
        }
        clamp01(1.0 - (ratio - 1.0) * 0.5)
    };

    // Stability: success, with a penalty per extra iteration.
    let stability = if !record.ok {
        0.0
    } else if record.iterations > 1 {
        reasons.push("Multiple iterations used (stability penalty).".to_string());
        clamp01(1.0 - (record.iterations as f64 - 1.0) * 0.2)
    } else {
        1.0
    };

    EvalReport {
        run_id: record.run_id.clone(),
        quality_score: clamp01(quality),
        structure_score: clamp01(structure),
        cost_score: clamp01(cost_score),
        stability_score: clamp01(stability),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentState;
    use chrono::Utc;

    fn record(ok: bool, iterations: u32, final_answer: Option<&str>, cost: f64) -> RunRecord {
        RunRecord {
            run_id: "r1".into(),
            created_at: Utc::now(),
            objective: "summarize the incident report".into(),
            ok,
            iterations,
            final_answer: final_answer.map(String::from),
            state: AgentState::default(),
            steps: Vec::new(),
            total_tokens: 100,
            total_cost: cost,
            memory_used: Vec::new(),
        }
    }

    #[test]
    fn clean_single_iteration_run_scores_high() {
        let report = evaluate_run(
            &record(true, 1, Some("summarize of the incident report findings"), 0.01),
            DEFAULT_COST_BUDGET,
        );
        assert_eq!(report.structure_score, 1.0);
        assert_eq!(report.cost_score, 1.0);
        assert_eq!(report.stability_score, 1.0);
    }

    #[test]
    fn missing_answer_zeroes_structure() {
        let report = evaluate_run(&record(true, 1, None, 0.01), DEFAULT_COST_BUDGET);
        assert_eq!(report.structure_score, 0.0);
        assert_eq!(report.quality_score, 0.0);
        assert!(report.reasons.iter().any(|r| r.contains("Missing final_answer")));
    }

    #[test]
    fn short_answer_is_penalized() {
        let report = evaluate_run(&record(true, 1, Some("too short"), 0.01), DEFAULT_COST_BUDGET);
        assert_eq!(report.structure_score, 0.4);
    }

    #[test]
    fn over_budget_cost_is_penalized_and_clamped() {
        let report = evaluate_run(&record(true, 1, Some("a perfectly adequate answer"), 0.10), 0.05);
        assert!(report.cost_score < 1.0);
        assert!(report.cost_score >= 0.0);
        assert!(report.reasons.iter().any(|r| r.contains("exceeds budget")));

        let extreme = evaluate_run(&record(true, 1, Some("answer"), 10.0), 0.05);
        assert_eq!(extreme.cost_score, 0.0);
    }

    #[test]
    fn failed_run_zeroes_stability() {
        let report = evaluate_run(&record(false, 3, Some("gave up"), 0.01), DEFAULT_COST_BUDGET);
        assert_eq!(report.stability_score, 0.0);
    }

    #[test]
    fn extra_iterations_cost_stability() {
        let report = evaluate_run(
            &record(true, 3, Some("an answer that eventually landed"), 0.01),
            DEFAULT_COST_BUDGET,
        );
        assert!((report.stability_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn zero_budget_disables_cost_scoring() {
        let report = evaluate_run(&record(true, 1, Some("whatever it takes"), 5.0), 0.0);
        assert_eq!(report.cost_score, 1.0);
    }
}
