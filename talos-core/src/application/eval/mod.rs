mod heuristic;
mod judge;

pub use heuristic::{EVAL_REPORT_KIND, EvalReport, evaluate_run};
pub use judge::{JUDGE_REPORT_KIND, JudgeError, JudgeReport, judge_run, judge_schema};
