use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::memory::{MemoryRetriever, format_memories};
use crate::application::pipeline::execute_plan;
use crate::application::tooling::ToolRouter;
use crate::domain::{
    AgentRunResult, AgentState, Plan, StepExecution, ToolObservation,
};
use crate::infrastructure::model::{
    FieldKind, FieldSpec, Schema, Structured, StructuredClient, TextGenerator, Usage,
};
use crate::infrastructure::store::{RunRecord, RunStore};
use crate::prompts::PromptLibrary;

use super::done::deterministic_done_check;
use super::errors::AgentError;
use super::models::AgentOptions;

const REPLANNER_PROMPT: &str = "replanner";

/// Shape the planner must produce each iteration. Steps may be empty:
/// an empty plan is a recoverable condition the loop absorbs, not a
/// schema violation.
pub fn plan_schema() -> Schema {
    Schema {
        name: "plan",
        fields: vec![
            FieldSpec::required("objective", FieldKind::String { non_empty: false }),
            FieldSpec::required(
                "steps",
                FieldKind::Array {
                    items: Box::new(FieldKind::Struct(Schema {
                        name: "plan_step",
                        fields: vec![
                            FieldSpec::required("step_id", FieldKind::UInt { min: Some(1) }),
                            FieldSpec::required("tool_name", FieldKind::String { non_empty: true }),
                            FieldSpec::optional("args", FieldKind::Object),
                        ],
                    })),
                    min_items: 0,
                },
            ),
        ],
    }
}

/// Plan -> execute -> observe -> replan loop with deterministic stopping.
///
/// One loop instance drives one run at a time, one iteration at a time,
/// one step at a time; the only suspension points are the external-call
/// seams (model, tools, store).
pub struct AgentLoop<G> {
    client: StructuredClient<G>,
    router: Arc<ToolRouter>,
    store: Arc<dyn RunStore>,
    prompts: PromptLibrary,
    memory: MemoryRetriever,
    options: AgentOptions,
}

impl<G: TextGenerator> AgentLoop<G> {
    pub fn new(
        client: StructuredClient<G>,
        router: Arc<ToolRouter>,
        store: Arc<dyn RunStore>,
        prompts: PromptLibrary,
        options: AgentOptions,
    ) -> Self {
        let memory = MemoryRetriever::new(store.clone());
        Self {
            client,
            router,
            store,
            prompts,
            memory,
            options,
        }
    }

    pub async fn run(&self, objective: &str) -> Result<AgentRunResult, AgentError> {
        let run_id = new_run_id();
        let payload = objective_payload(objective);

        let mut state = AgentState::default();
        let mut steps_log: Vec<StepExecution> = Vec::new();
        let mut usage = Usage::default();
        let mut final_answer: Option<String> = None;

        // Retrieved once per run; the objective is immutable so the
        // scores cannot change between iterations.
        let memories = match self
            .memory
            .find_relevant(objective, self.options.memory_k, self.options.memory_scan_limit)
            .await
        {
            Ok(memories) => memories,
            Err(error) => {
                warn!(run_id = %run_id, error = %error, "memory retrieval failed, continuing without context");
                Vec::new()
            }
        };
        let memory_used: Vec<String> = memories.iter().map(|m| m.run_id.clone()).collect();
        let memories_text = format_memories(&memories);
        info!(run_id = %run_id, count = memories.len(), "memory retrieved");

        info!(
            run_id = %run_id,
            objective,
            max_iterations = self.options.max_iterations,
            dry_run = self.options.dry_run,
            "agent loop started"
        );

        for iteration in 1..=self.options.max_iterations {
            info!(run_id = %run_id, iteration, "iteration started");

            let notes = format_notes(&state.notes);
            let last_results = serde_json::to_string(&state.last_tool_results)
                .unwrap_or_else(|_| "[]".to_string());
            let prompt = self.prompts.load(
                REPLANNER_PROMPT,
                &self.options.planner_version,
                &[
                    ("objective", objective),
                    ("objective_payload", &payload),
                    ("notes", &notes),
                    ("last_tool_results", &last_results),
                    (
                        "memories",
                        if iteration == 1 { "(none)" } else { &memories_text },
                    ),
                ],
            )?;

            let generated: Structured<Plan> =
                self.client.generate_structured(&prompt, &plan_schema()).await?;
            usage.add(generated.usage);
            let mut plan = generated.value;

            info!(run_id = %run_id, iteration, steps = plan.steps.len(), "plan created");

            if plan.steps.is_empty() {
                state.notes.push("Planner returned empty steps.".to_string());
                if self.options.dry_run {
                    return Ok(AgentRunResult {
                        run_id,
                        ok: false,
                        objective: objective.to_string(),
                        iterations: iteration,
                        state,
                        final_answer: Some("[dry run] planner returned an empty plan".to_string()),
                    });
                }
                continue;
            }

            self.enforce_payload_guard(&mut plan, &payload)?;

            if self.options.dry_run {
                info!(run_id = %run_id, iteration, "dry run exit, nothing executed or persisted");
                let rendered =
                    serde_json::to_string(&plan).unwrap_or_else(|_| "<unprintable>".to_string());
                return Ok(AgentRunResult {
                    run_id,
                    ok: true,
                    objective: objective.to_string(),
                    iterations: iteration,
                    state,
                    final_answer: Some(format!("[dry run] plan: {rendered}")),
                });
            }

            let summary = execute_plan(self.router.as_ref(), &plan, &run_id).await;
            steps_log.extend(summary.steps.iter().cloned());

            for execution in &summary.steps {
                observe(&mut state, execution);
            }
            info!(
                run_id = %run_id,
                iteration,
                notes = state.notes.len(),
                "state updated"
            );

            let check = deterministic_done_check(
                objective,
                state.last_tool_results.last(),
                &self.options.done,
            );
            info!(
                run_id = %run_id,
                iteration,
                done = check.done,
                rationale = %check.rationale,
                "done check evaluated"
            );

            if check.done {
                final_answer = Some(check.rationale);
                let result = AgentRunResult {
                    run_id: run_id.clone(),
                    ok: true,
                    objective: objective.to_string(),
                    iterations: iteration,
                    state,
                    final_answer,
                };
                self.persist(&result, &steps_log, usage, &memory_used).await?;
                return Ok(result);
            }
        }

        let result = AgentRunResult {
            run_id: run_id.clone(),
            ok: false,
            objective: objective.to_string(),
            iterations: self.options.max_iterations,
            state,
            final_answer,
        };
        self.persist(&result, &steps_log, usage, &memory_used).await?;
        info!(
            run_id = %run_id,
            iterations = result.iterations,
            total_tokens = usage.tokens,
            total_cost = usage.cost,
            "agent loop exhausted its iteration budget"
        );
        Ok(result)
    }

    /// Hard-override guarded steps with the literal objective payload,
    /// then verify the override held. A mismatch after enforcement means
    /// the plan structure itself is broken.
    fn enforce_payload_guard(&self, plan: &mut Plan, payload: &str) -> Result<(), AgentError> {
        for step in &mut plan.steps {
            if step.tool_name == self.options.summarize_tool {
                step.args
                    .insert("text".to_string(), Value::String(payload.to_string()));
                step.args.insert(
                    "max_sentences".to_string(),
                    Value::from(self.options.summarize_max_sentences),
                );
                debug!(step_id = step.step_id, "objective payload enforced on guarded step");
            }
        }

        for step in &plan.steps {
            if step.tool_name == self.options.summarize_tool
                && step.args.get("text").and_then(Value::as_str) != Some(payload)
            {
                return Err(AgentError::PlannerContract {
                    step_id: step.step_id,
                });
            }
        }
        Ok(())
    }

    async fn persist(
        &self,
        result: &AgentRunResult,
        steps: &[StepExecution],
        usage: Usage,
        memory_used: &[String],
    ) -> Result<(), AgentError> {
        let record = RunRecord {
            run_id: result.run_id.clone(),
            created_at: chrono::Utc::now(),
            objective: result.objective.clone(),
            ok: result.ok,
            iterations: result.iterations,
            final_answer: result.final_answer.clone(),
            state: result.state.clone(),
            steps: steps.to_vec(),
            total_tokens: usage.tokens,
            total_cost: usage.cost,
            memory_used: memory_used.to_vec(),
        };
        self.store
            .save_run(&record)
            .await
            .map_err(|source| AgentError::Persist {
                run_id: result.run_id.clone(),
                source,
            })
    }
}

/// Everything after the first `:` is a literal payload downstream guards
/// must preserve verbatim; without a separator the whole objective is the
/// payload.
fn objective_payload(objective: &str) -> String {
    objective
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_else(|| objective.to_string())
}

fn format_notes(notes: &[String]) -> String {
    if notes.is_empty() {
        "- (none)".to_string()
    } else {
        notes
            .iter()
            .map(|note| format!("- {note}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn observe(state: &mut AgentState, execution: &StepExecution) {
    if execution.ok {
        state.last_tool_results.push(ToolObservation {
            step_id: execution.step_id,
            tool_name: execution.tool_name.clone(),
            data: execution.data.clone(),
            error: None,
        });
        state.notes.push(format!(
            "Step {} ({}) succeeded.",
            execution.step_id, execution.tool_name
        ));
    } else {
        state.last_tool_results.push(ToolObservation {
            step_id: execution.step_id,
            tool_name: execution.tool_name.clone(),
            data: None,
            error: execution.error.clone(),
        });
        state.notes.push(format!(
            "Step {} ({}) failed: {}",
            execution.step_id,
            execution.tool_name,
            execution.error.as_deref().unwrap_or("unknown error")
        ));
    }
}

fn new_run_id() -> String {
    Uuid::new_v4().simple().to_string()
}
