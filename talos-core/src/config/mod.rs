mod error;
mod loader;

use std::path::PathBuf;

pub use error::ConfigError;
pub use loader::load_config;

pub const CONFIG_PATH: &str = "talos.toml";

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    pub data_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub model: String,
    /// Model used by the `judge` command; defaults to `model`.
    pub judge_model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub cost_per_1k_tokens: f64,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub planner_version: String,
    pub memory_k: usize,
    pub memory_scan_limit: usize,
    pub summarize_max_sentences: u64,
    pub sentence_tolerance: u32,
}
