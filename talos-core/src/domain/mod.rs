mod types;

pub use types::{
    AgentRunResult, AgentState, DoneCheck, JsonMap, MemoryRecord, Plan, PlanStep, RunSummary,
    StepExecution, ToolCall, ToolObservation, ToolOutcome,
};
