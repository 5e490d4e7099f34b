//! Deterministic completion check.
//!
//! Stop conditions are control logic; the model is never consulted here.

use serde_json::Value;

use crate::domain::{DoneCheck, ToolObservation};

use super::models::DoneOptions;

/// Decide whether the run is finished based on the most recent tool
/// result only. Hard gates, in order: a result must exist, carry data
/// with a non-empty `summary` string and a `key_points` list of at least
/// two entries, and (when the objective asks for a specific number of
/// sentences) the summary's sentence count must land inside the
/// tolerance band.
pub fn deterministic_done_check(
    objective: &str,
    latest_tool_result: Option<&ToolObservation>,
    options: &DoneOptions,
) -> DoneCheck {
    let Some(latest) = latest_tool_result else {
        return DoneCheck::not_done("No tool result available yet.");
    };

    let Some(data) = latest.data.as_ref() else {
        return DoneCheck::not_done("Missing data.summary.");
    };

    let summary = match data.get("summary").and_then(Value::as_str) {
        Some(summary) if !summary.trim().is_empty() => summary,
        _ => return DoneCheck::not_done("Missing data.summary."),
    };

    let key_points = match data.get("key_points").and_then(Value::as_array) {
        Some(points) if points.len() >= 2 => points,
        _ => return DoneCheck::not_done("Missing data.key_points (need at least 2)."),
    };

    if let Some(requested) = requested_sentence_count(objective) {
        let lower = requested.saturating_sub(options.sentence_tolerance as u64).max(1);
        let upper = requested + options.sentence_tolerance as u64;
        let count = sentence_count(summary);
        if count < lower || count > upper {
            return DoneCheck::not_done(format!(
                "Summary sentence count out of range (got {count}, expected {lower}-{upper})."
            ));
        }
    }

    let points = key_points
        .iter()
        .map(render_point)
        .filter(|point| !point.is_empty())
        .collect::<Vec<_>>()
        .join("\n- ");
    DoneCheck::done(format!(
        "SUMMARY: {}\nKEY POINTS:\n- {points}",
        summary.trim()
    ))
}

/// Find a "N sentence(s)" request in the objective, if any.
fn requested_sentence_count(objective: &str) -> Option<u64> {
    let lowered = objective.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.windows(2).find_map(|window| {
        if window[1].starts_with("sentence") {
            window[0].parse::<u64>().ok()
        } else {
            None
        }
    })
}

/// Count sentences by terminal punctuation, ignoring empty fragments.
fn sentence_count(summary: &str) -> u64 {
    summary
        .replace(['!', '?'], ".")
        .split('.')
        .filter(|fragment| !fragment.trim().is_empty())
        .count() as u64
}

fn render_point(point: &Value) -> String {
    match point {
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JsonMap;
    use serde_json::json;

    fn observation(data: Option<Value>) -> ToolObservation {
        ToolObservation {
            step_id: 1,
            tool_name: "summarize_text".into(),
            data: data.map(|value| {
                value
                    .as_object()
                    .cloned()
                    .unwrap_or_else(JsonMap::new)
            }),
            error: None,
        }
    }

    fn check(objective: &str, data: Option<Value>) -> DoneCheck {
        let obs = data.map(|value| observation(Some(value)));
        deterministic_done_check(objective, obs.as_ref(), &DoneOptions::default())
    }

    #[test]
    fn no_result_is_not_done() {
        let verdict = deterministic_done_check("anything", None, &DoneOptions::default());
        assert!(!verdict.done);
        assert_eq!(verdict.rationale, "No tool result available yet.");
    }

    #[test]
    fn failed_result_without_data_is_not_done() {
        let obs = ToolObservation {
            step_id: 1,
            tool_name: "summarize_text".into(),
            data: None,
            error: Some("Unknown tool".into()),
        };
        let verdict = deterministic_done_check("anything", Some(&obs), &DoneOptions::default());
        assert!(!verdict.done);
    }

    #[test]
    fn empty_summary_is_not_done() {
        let verdict = check(
            "summarize this",
            Some(json!({"summary": "", "key_points": ["x", "y"]})),
        );
        assert!(!verdict.done);
        assert_eq!(verdict.rationale, "Missing data.summary.");
    }

    #[test]
    fn too_few_key_points_is_not_done() {
        let verdict = check(
            "summarize this",
            Some(json!({"summary": "Fine.", "key_points": ["only one"]})),
        );
        assert!(!verdict.done);
        assert_eq!(verdict.rationale, "Missing data.key_points (need at least 2).");
    }

    #[test]
    fn good_result_is_done_with_rendered_rationale() {
        let verdict = check(
            "summarize this",
            Some(json!({"summary": "Fine.", "key_points": ["a", "b"]})),
        );
        assert!(verdict.done);
        assert_eq!(verdict.rationale, "SUMMARY: Fine.\nKEY POINTS:\n- a\n- b");
    }

    #[test]
    fn sentence_request_enforces_tolerance_band() {
        let within = check(
            "summarize in 2 sentences: some text",
            Some(json!({"summary": "One. Two. Three.", "key_points": ["a", "b"]})),
        );
        assert!(within.done, "3 sentences is inside the 1-3 band");

        let outside = check(
            "summarize in 2 sentences: some text",
            Some(json!({
                "summary": "One. Two. Three. Four.",
                "key_points": ["a", "b"]
            })),
        );
        assert!(!outside.done);
        assert!(outside.rationale.contains("got 4"), "rationale: {}", outside.rationale);
        assert!(outside.rationale.contains("expected 1-3"));
    }

    #[test]
    fn exclamations_and_questions_count_as_sentences() {
        let verdict = check(
            "summarize in 2 sentences: some text",
            Some(json!({"summary": "Really! Sure?", "key_points": ["a", "b"]})),
        );
        assert!(verdict.done);
    }

    #[test]
    fn no_sentence_request_skips_the_band() {
        let verdict = check(
            "summarize this report",
            Some(json!({
                "summary": "A. B. C. D. E. F.",
                "key_points": ["a", "b"]
            })),
        );
        assert!(verdict.done);
    }

    #[test]
    fn non_string_key_points_are_stringified() {
        let verdict = check(
            "summarize this",
            Some(json!({"summary": "Fine.", "key_points": [1, 2]})),
        );
        assert!(verdict.done);
        assert!(verdict.rationale.contains("- 1\n- 2"));
    }
}
