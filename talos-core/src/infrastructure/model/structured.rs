use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::schema::Schema;
use super::traits::TextGenerator;
use super::types::{ProviderError, Usage};

/// Knobs for the structured-output retry policy.
#[derive(Debug, Clone)]
pub struct StructuredOptions {
    /// Generation attempts before giving up. Clamped to at least 1.
    pub max_attempts: u32,
    /// First backoff delay; doubles after every failed attempt.
    pub base_backoff: Duration,
    /// Whether a malformed output gets one corrective generation call
    /// before the attempt is counted as failed.
    pub repair: bool,
}

impl Default for StructuredOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            repair: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("model returned invalid JSON")]
    InvalidJson,
    #[error("model JSON did not match schema '{schema}': {detail}")]
    SchemaViolation { schema: &'static str, detail: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("structured generation failed after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<StructuredError>,
    },
}

/// A validated value plus the usage accumulated producing it (including
/// failed attempts and repair calls that returned a completion).
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    pub usage: Usage,
}

/// Wraps a raw text generator and turns free-text model output into
/// schema-validated values.
///
/// Each attempt is: generate, parse as JSON, validate against the schema.
/// Invalid JSON and schema violations are distinct failure classes; both
/// trigger one repair call (when enabled) built from the malformed output,
/// and a successful repair returns immediately. Provider faults are
/// retried without repair. Failed attempts are separated by exponential
/// backoff; exhausting the attempt budget is fatal and carries the last
/// observed error as its source.
pub struct StructuredClient<G> {
    generator: G,
    options: StructuredOptions,
}

impl<G: TextGenerator> StructuredClient<G> {
    pub fn new(generator: G, options: StructuredOptions) -> Self {
        Self { generator, options }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: &Schema,
    ) -> Result<Structured<T>, StructuredError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut usage = Usage::default();
        let mut last_error = StructuredError::InvalidJson;

        for attempt in 1..=max_attempts {
            debug!(schema = schema.name, attempt, max_attempts, "structured generation attempt");

            match self.generator.generate(prompt).await {
                Ok(completion) => {
                    usage.add(completion.usage);
                    match parse_and_validate::<T>(&completion.text, schema) {
                        Ok(value) => {
                            debug!(schema = schema.name, attempt, "model output validated");
                            return Ok(Structured { value, usage });
                        }
                        Err(error) => {
                            warn!(
                                schema = schema.name,
                                attempt,
                                error = %error,
                                "model output failed validation"
                            );
                            if self.options.repair {
                                match self.repair::<T>(&completion.text, schema, &mut usage).await {
                                    Ok(value) => {
                                        info!(schema = schema.name, attempt, "repair call succeeded");
                                        return Ok(Structured { value, usage });
                                    }
                                    Err(repair_error) => {
                                        debug!(
                                            schema = schema.name,
                                            attempt,
                                            error = %repair_error,
                                            "repair call failed"
                                        );
                                    }
                                }
                            }
                            last_error = error;
                        }
                    }
                }
                Err(provider_error) => {
                    warn!(
                        schema = schema.name,
                        attempt,
                        error = %provider_error,
                        "text generation call failed"
                    );
                    last_error = StructuredError::Provider(provider_error);
                }
            }

            if attempt < max_attempts {
                let delay = self.options.base_backoff * 2u32.pow(attempt - 1);
                debug!(
                    schema = schema.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before next attempt"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            schema = schema.name,
            attempts = max_attempts,
            error = %last_error,
            "structured generation exhausted its attempt budget"
        );
        Err(StructuredError::Exhausted {
            attempts: max_attempts,
            source: Box::new(last_error),
        })
    }

    async fn repair<T: DeserializeOwned>(
        &self,
        malformed: &str,
        schema: &Schema,
        usage: &mut Usage,
    ) -> Result<T, StructuredError> {
        info!(schema = schema.name, "attempting repair of malformed output");
        let prompt = repair_prompt(malformed, schema);
        let completion = self.generator.generate(&prompt).await?;
        usage.add(completion.usage);
        parse_and_validate(&completion.text, schema)
    }
}

fn repair_prompt(malformed: &str, schema: &Schema) -> String {
    format!(
        "The previous output was supposed to be a single JSON object matching \
the '{name}' schema but did not conform.\n\
Expected fields:\n{fields}\n\n\
Previous output:\n{malformed}\n\n\
Respond with ONLY the corrected JSON object. No commentary, no code fences.",
        name = schema.name,
        fields = schema.describe(),
    )
}

fn parse_and_validate<T: DeserializeOwned>(
    raw: &str,
    schema: &Schema,
) -> Result<T, StructuredError> {
    let value = extract_json(raw).ok_or(StructuredError::InvalidJson)?;
    schema
        .validate(&value)
        .map_err(|detail| StructuredError::SchemaViolation {
            schema: schema.name,
            detail,
        })?;
    serde_json::from_value(value).map_err(|error| StructuredError::SchemaViolation {
        schema: schema.name,
        detail: error.to_string(),
    })
}

/// Salvage a JSON value from raw model text: direct parse first, then a
/// fenced ```json block, then the outermost brace-delimited slice.
fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if trimmed.starts_with("```") {
        let stripped = trimmed.trim_start_matches("```json");
        let stripped = stripped.trim_start_matches("```JSON");
        let stripped = stripped.trim_start_matches("```");
        if let Some(end) = stripped.rfind("```") {
            let slice = &stripped[..end];
            if let Ok(value) = serde_json::from_str::<Value>(slice.trim()) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let candidate = &trimmed[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::model::schema::{FieldKind, FieldSpec};
    use crate::infrastructure::model::types::Completion;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        done: bool,
        rationale: String,
    }

    fn verdict_schema() -> Schema {
        Schema {
            name: "verdict",
            fields: vec![
                FieldSpec::required("done", FieldKind::Bool),
                FieldSpec::required("rationale", FieldKind::String { non_empty: true }),
            ],
        }
    }

    #[derive(Clone)]
    struct ScriptedGenerator {
        responses: Arc<Mutex<Vec<Result<String, ()>>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<&str, ()>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(String::from))
                        .collect(),
                )),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        async fn prompts(&self) -> Vec<String> {
            self.prompts.lock().await.clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError> {
            self.prompts.lock().await.push(prompt.to_string());
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Err(ProviderError::invalid_response("scripted", "script exhausted"));
            }
            match responses.remove(0) {
                Ok(text) => Ok(Completion {
                    text,
                    usage: Usage::new(10, 0.001),
                }),
                Err(()) => Err(ProviderError::http("scripted", 503)),
            }
        }
    }

    fn fast_options() -> StructuredOptions {
        StructuredOptions {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            repair: true,
        }
    }

    #[tokio::test]
    async fn valid_output_returns_on_first_attempt() {
        let generator =
            ScriptedGenerator::new(vec![Ok(r#"{"done": true, "rationale": "all good"}"#)]);
        let client = StructuredClient::new(generator.clone(), fast_options());

        let result: Structured<Verdict> = client
            .generate_structured("check", &verdict_schema())
            .await
            .expect("structured call succeeds");

        assert!(result.value.done);
        assert_eq!(result.usage.tokens, 10);
        assert_eq!(generator.prompts().await.len(), 1);
    }

    #[tokio::test]
    async fn fenced_output_is_salvaged() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "```json\n{\"done\": false, \"rationale\": \"keep going\"}\n```",
        )]);
        let client = StructuredClient::new(generator, fast_options());

        let result: Structured<Verdict> = client
            .generate_structured("check", &verdict_schema())
            .await
            .expect("fenced output parses");
        assert!(!result.value.done);
    }

    #[tokio::test]
    async fn repair_short_circuits_the_retry_loop() {
        let generator = ScriptedGenerator::new(vec![
            Ok("this is not json"),
            Ok(r#"{"done": true, "rationale": "repaired"}"#),
        ]);
        let client = StructuredClient::new(generator.clone(), fast_options());

        let result: Structured<Verdict> = client
            .generate_structured("check", &verdict_schema())
            .await
            .expect("repair succeeds");

        assert_eq!(result.value.rationale, "repaired");
        // One primary call plus one repair call; the attempt budget is
        // not consumed further.
        let prompts = generator.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("did not conform"));
        assert!(prompts[1].contains("this is not json"));
        assert!(prompts[1].contains("rationale"));
        // Usage accumulates across both completions.
        assert_eq!(result.usage.tokens, 20);
    }

    #[tokio::test]
    async fn schema_violation_is_repaired_too() {
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"done": "yes", "rationale": "wrong type"}"#),
            Ok(r#"{"done": true, "rationale": "fixed"}"#),
        ]);
        let client = StructuredClient::new(generator, fast_options());

        let result: Structured<Verdict> = client
            .generate_structured("check", &verdict_schema())
            .await
            .expect("repair succeeds");
        assert_eq!(result.value.rationale, "fixed");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_max_attempts_with_growing_backoff() {
        let generator = ScriptedGenerator::new(vec![
            Ok("nope"),
            Ok("still nope"),
            Ok("never json"),
        ]);
        let client = StructuredClient::new(
            generator.clone(),
            StructuredOptions {
                max_attempts: 3,
                base_backoff: Duration::from_secs(1),
                repair: false,
            },
        );
        let start = Instant::now();

        let error = client
            .generate_structured::<Verdict>("check", &verdict_schema())
            .await
            .expect_err("attempt budget exhausts");

        match error {
            StructuredError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, StructuredError::InvalidJson));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Exactly max_attempts generation calls, no repair calls.
        assert_eq!(generator.prompts().await.len(), 3);
        // Backoff slept 1s then 2s between the three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn transient_provider_failure_is_retried_without_repair() {
        let generator = ScriptedGenerator::new(vec![
            Err(()),
            Ok(r#"{"done": true, "rationale": "second try"}"#),
        ]);
        let client = StructuredClient::new(generator.clone(), fast_options());

        let result: Structured<Verdict> = client
            .generate_structured("check", &verdict_schema())
            .await
            .expect("retry succeeds");

        assert_eq!(result.value.rationale, "second try");
        let prompts = generator.prompts().await;
        // Two primary attempts with the original prompt; no repair prompt
        // was issued for the provider fault.
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        // Only the successful completion contributed usage.
        assert_eq!(result.usage.tokens, 10);
    }

    #[tokio::test]
    async fn exhaustion_carries_last_provider_error() {
        let generator = ScriptedGenerator::new(vec![Err(()), Err(())]);
        let client = StructuredClient::new(
            generator,
            StructuredOptions {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                repair: true,
            },
        );

        let error = client
            .generate_structured::<Verdict>("check", &verdict_schema())
            .await
            .expect_err("exhausts");
        match error {
            StructuredError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, StructuredError::Provider(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
