//! talos-core: an LLM-driven agent orchestrator.
//!
//! The loop turns a natural-language objective into a structured plan,
//! executes the plan's steps against an allowlisted set of tools, observes
//! the results and decides deterministically when to stop. Model output is
//! never trusted raw: every plan passes through the structured-output
//! protocol (parse, validate, repair, backoff-retry) before anything runs.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod prompts;

pub use application::{agent, eval, memory, pipeline, tooling};
pub use config::AppConfig;
pub use infrastructure::{model, store};
