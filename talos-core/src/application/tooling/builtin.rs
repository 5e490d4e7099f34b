use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::JsonMap;

use super::{Tool, ToolFailure};

/// Name of the designated summarize tool the agent's payload guard
/// targets.
pub const SUMMARIZE_TOOL: &str = "summarize_text";

/// Naive first-N-sentences summarizer. Deterministic on purpose: it
/// exercises routing, caching and the done-check without model
/// variability.
pub struct SummarizeText;

#[derive(Deserialize)]
struct SummarizeArgs {
    text: String,
    #[serde(default = "default_max_sentences")]
    max_sentences: usize,
}

fn default_max_sentences() -> usize {
    2
}

#[async_trait]
impl Tool for SummarizeText {
    fn name(&self) -> &str {
        SUMMARIZE_TOOL
    }

    async fn invoke(&self, args: JsonMap) -> Result<Value, ToolFailure> {
        let args: SummarizeArgs = serde_json::from_value(Value::Object(args))
            .map_err(|error| ToolFailure::bad_args(error.to_string()))?;

        let sentences: Vec<String> = args
            .text
            .replace('\n', " ")
            .split('.')
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .map(str::to_string)
            .collect();

        let mut summary = sentences
            .iter()
            .take(args.max_sentences)
            .cloned()
            .collect::<Vec<_>>()
            .join(". ");
        if !summary.is_empty() && !summary.ends_with('.') {
            summary.push('.');
        }

        let key_points: Vec<String> = sentences.iter().take(5).cloned().collect();

        Ok(json!({
            "summary": summary,
            "key_points": key_points,
        }))
    }
}
