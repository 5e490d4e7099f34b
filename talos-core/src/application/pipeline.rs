//! Sequential plan execution with fail-fast semantics.

use tracing::{debug, info};

use crate::application::tooling::ToolRouter;
use crate::domain::{Plan, RunSummary, StepExecution, ToolCall};

/// Run every step of `plan` in order through the router. The first
/// failing step terminates the execution; the summary covers only the
/// steps attempted up to and including that failure. Partial plans are
/// never resumed; recovery belongs to the next replanning iteration.
pub async fn execute_plan(router: &ToolRouter, plan: &Plan, run_id: &str) -> RunSummary {
    info!(run_id, objective = %plan.objective, steps = plan.steps.len(), "plan execution started");

    let mut executed: Vec<StepExecution> = Vec::new();
    let mut overall_ok = true;

    for step in &plan.steps {
        debug!(
            run_id,
            step_id = step.step_id,
            tool = %step.tool_name,
            arg_keys = ?step.args.keys().collect::<Vec<_>>(),
            "step started"
        );

        let outcome = router.run(&ToolCall::from_step(step)).await;
        let execution = StepExecution::from_outcome(step, outcome);

        info!(
            run_id,
            step_id = execution.step_id,
            tool = %execution.tool_name,
            ok = execution.ok,
            error = execution.error.as_deref().unwrap_or(""),
            "step finished"
        );

        let failed = !execution.ok;
        executed.push(execution);
        if failed {
            overall_ok = false;
            break;
        }
    }

    info!(run_id, ok = overall_ok, steps = executed.len(), "plan execution finished");
    RunSummary {
        objective: plan.objective.clone(),
        ok: overall_ok,
        steps: executed,
    }
}
