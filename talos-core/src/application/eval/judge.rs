//! Model-based rubric scoring. Catches quality regressions the
//! heuristics cannot see, while keeping the output structured.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::infrastructure::model::{
    FieldKind, FieldSpec, Schema, Structured, StructuredClient, StructuredError, TextGenerator,
};
use crate::infrastructure::store::RunRecord;
use crate::prompts::{PromptError, PromptLibrary};

/// Report kind under which judge scores are stored.
pub const JUDGE_REPORT_KIND: &str = "judge";

const JUDGE_PROMPT: &str = "judge";
const JUDGE_PROMPT_VERSION: &str = "v1";
const MAX_OBJECTIVE_CHARS: usize = 1000;
const MAX_ANSWER_CHARS: usize = 3000;
const MAX_SUMMARIZED_STEPS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub run_id: String,
    pub judge_model: String,
    pub overall: f64,
    pub correctness: f64,
    pub completeness: f64,
    pub concision: f64,
    pub clarity: f64,
    pub safety: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error(transparent)]
    Structured(#[from] StructuredError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

pub fn judge_schema() -> Schema {
    let score = || FieldKind::Float {
        min: Some(0.0),
        max: Some(1.0),
    };
    Schema {
        name: "judge_report",
        fields: vec![
            FieldSpec::required("run_id", FieldKind::String { non_empty: true }),
            FieldSpec::required("judge_model", FieldKind::String { non_empty: true }),
            FieldSpec::required("overall", score()),
            FieldSpec::required("correctness", score()),
            FieldSpec::required("completeness", score()),
            FieldSpec::required("concision", score()),
            FieldSpec::required("clarity", score()),
            FieldSpec::required("safety", score()),
            FieldSpec::required(
                "reasons",
                FieldKind::Array {
                    items: Box::new(FieldKind::String { non_empty: false }),
                    min_items: 0,
                },
            ),
        ],
    }
}

/// Score a persisted run against the judge rubric. The caller picks the
/// judge model by wiring the structured client; nothing shared is
/// mutated.
pub async fn judge_run<G: TextGenerator>(
    client: &StructuredClient<G>,
    prompts: &PromptLibrary,
    record: &RunRecord,
    judge_model: &str,
) -> Result<Structured<JudgeReport>, JudgeError> {
    let steps_summary = summarize_steps(record);
    let objective = clip(&record.objective, MAX_OBJECTIVE_CHARS);
    let final_answer = clip(record.final_answer.as_deref().unwrap_or(""), MAX_ANSWER_CHARS);

    let prompt = prompts.load(
        JUDGE_PROMPT,
        JUDGE_PROMPT_VERSION,
        &[
            ("run_id", record.run_id.as_str()),
            ("judge_model", judge_model),
            ("objective", &objective),
            ("final_answer", &final_answer),
            ("steps_summary", &steps_summary),
        ],
    )?;

    info!(run_id = %record.run_id, judge_model, "judging run");
    let report = client.generate_structured(&prompt, &judge_schema()).await?;
    Ok(report)
}

/// Short per-step digest so the judge prompt stays bounded no matter how
/// long the run was.
fn summarize_steps(record: &RunRecord) -> String {
    if record.steps.is_empty() {
        return "(none)".to_string();
    }
    record
        .steps
        .iter()
        .take(MAX_SUMMARIZED_STEPS)
        .map(|step| format!("{} ok={}", step.tool_name, step.ok))
        .collect::<Vec<_>>()
        .join("; ")
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
