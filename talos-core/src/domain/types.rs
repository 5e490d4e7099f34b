use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object as carried through plans, tool calls and step results.
pub type JsonMap = Map<String, Value>;

/// One planned tool invocation. `step_id` is planner-assigned, starts at 1
/// and is unique within a plan; it is not unique across iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: u32,
    pub tool_name: String,
    #[serde(default)]
    pub args: JsonMap,
}

/// An ordered, executable plan produced by the model for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub objective: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// Explicit tool-invocation request handed to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub args: JsonMap,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, args: JsonMap) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }

    pub fn from_step(step: &PlanStep) -> Self {
        Self {
            tool_name: step.tool_name.clone(),
            args: step.args.clone(),
        }
    }
}

/// Router verdict for one tool call. `data` is present iff `ok`,
/// `error` iff not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn succeeded(tool_name: impl Into<String>, data: JsonMap) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// What happened when one plan step ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: u32,
    pub tool_name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepExecution {
    pub fn from_outcome(step: &PlanStep, outcome: ToolOutcome) -> Self {
        Self {
            step_id: step.step_id,
            tool_name: step.tool_name.clone(),
            ok: outcome.ok,
            data: outcome.data,
            error: outcome.error,
        }
    }
}

/// Result of executing one plan. `ok` is true iff no executed step failed;
/// `steps` covers only the steps attempted up to and including the first
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub objective: String,
    pub ok: bool,
    pub steps: Vec<StepExecution>,
}

/// A tool result as remembered by the agent between iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolObservation {
    pub step_id: u32,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accumulated loop state. Append-only within a run; never reset
/// mid-run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub last_tool_results: Vec<ToolObservation>,
}

/// Deterministic stop signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneCheck {
    pub done: bool,
    pub rationale: String,
}

impl DoneCheck {
    pub fn not_done(rationale: impl Into<String>) -> Self {
        Self {
            done: false,
            rationale: rationale.into(),
        }
    }

    pub fn done(rationale: impl Into<String>) -> Self {
        Self {
            done: true,
            rationale: rationale.into(),
        }
    }
}

/// Terminal record of one agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub run_id: String,
    pub ok: bool,
    pub objective: String,
    pub iterations: u32,
    pub state: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

/// A prior run scored against the current objective. Derived at retrieval
/// time, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub run_id: String,
    pub similarity: f64,
    pub objective: String,
    pub ok: bool,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}
