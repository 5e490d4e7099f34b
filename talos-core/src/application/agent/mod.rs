mod done;
mod errors;
mod models;
mod runner;


pub use done::deterministic_done_check;
pub use errors::AgentError;
pub use models::{AgentOptions, DoneOptions};
pub use runner::{AgentLoop, plan_schema};
