use thiserror::Error;

use crate::infrastructure::model::StructuredError;
use crate::infrastructure::store::StoreError;
use crate::prompts::PromptError;

/// Hard failures of the agent loop. Everything recoverable (failed
/// steps, unknown tools, empty plans) is absorbed into the run result
/// instead of surfacing here.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Structured(#[from] StructuredError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// The planner produced a guarded step whose arguments differ from
    /// the enforced objective payload. A broken invariant, not noise; it
    /// is never retried.
    #[error("planner violated the objective payload constraint on step {step_id}")]
    PlannerContract { step_id: u32 },
    #[error("failed to persist run '{run_id}'")]
    Persist {
        run_id: String,
        #[source]
        source: StoreError,
    },
}
