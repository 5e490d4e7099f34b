const DEFAULT_MAX_ITERATIONS: u32 = 3;
const DEFAULT_PLANNER_VERSION: &str = "v2";
const DEFAULT_MEMORY_K: usize = 3;
const DEFAULT_MEMORY_SCAN_LIMIT: usize = 50;
const DEFAULT_SUMMARIZE_MAX_SENTENCES: u64 = 2;

/// Tolerance applied to a sentence-count request found in the objective.
/// A request for N sentences accepts `max(1, N - tolerance) ..= N +
/// tolerance`. The band is a practicality heuristic; it is configuration,
/// not a load-bearing constant.
#[derive(Debug, Clone)]
pub struct DoneOptions {
    pub sentence_tolerance: u32,
}

impl Default for DoneOptions {
    fn default() -> Self {
        Self {
            sentence_tolerance: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub max_iterations: u32,
    pub planner_version: String,
    /// Validate the plan and return without executing tools or persisting.
    pub dry_run: bool,
    pub memory_k: usize,
    pub memory_scan_limit: usize,
    /// Tool name the objective-payload guard applies to.
    pub summarize_tool: String,
    /// `max_sentences` value the guard pins on guarded steps.
    pub summarize_max_sentences: u64,
    pub done: DoneOptions,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            planner_version: DEFAULT_PLANNER_VERSION.to_string(),
            dry_run: false,
            memory_k: DEFAULT_MEMORY_K,
            memory_scan_limit: DEFAULT_MEMORY_SCAN_LIMIT,
            summarize_tool: crate::application::tooling::SUMMARIZE_TOOL.to_string(),
            summarize_max_sentences: DEFAULT_SUMMARIZE_MAX_SENTENCES,
            done: DoneOptions::default(),
        }
    }
}
