use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::debug;

use super::error::ConfigError;
use super::{AgentSettings, AppConfig, CONFIG_PATH, ProviderSettings};
use crate::infrastructure::model::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT};

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    provider: Option<RawProvider>,
    data_dir: Option<String>,
    prompts_dir: Option<String>,
    #[serde(default)]
    agent: RawAgent,
}

#[derive(Debug, Deserialize, Default)]
struct RawProvider {
    endpoint: Option<String>,
    model: Option<String>,
    judge_model: Option<String>,
    api_key_env: Option<String>,
    temperature: Option<f32>,
    cost_per_1k_tokens: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgent {
    max_iterations: Option<u32>,
    planner_version: Option<String>,
    memory_k: Option<usize>,
    memory_scan_limit: Option<usize>,
    summarize_max_sentences: Option<u64>,
    sentence_tolerance: Option<u32>,
}

/// Ensures environment variables are loaded from `.env` exactly once.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}

/// Load and validate configuration from a file path (default
/// `talos.toml`).
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    read_config(config_path)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "reading configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_and_build(parsed)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let raw_provider = parsed.provider.unwrap_or_default();
    let model = raw_provider.model.ok_or(ConfigError::MissingModel)?;

    let provider = ProviderSettings {
        endpoint: raw_provider
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        judge_model: raw_provider.judge_model.unwrap_or_else(|| model.clone()),
        model,
        api_key_env: raw_provider
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        temperature: raw_provider.temperature.unwrap_or(0.2),
        cost_per_1k_tokens: raw_provider.cost_per_1k_tokens.unwrap_or(0.000_15),
    };

    let agent = AgentSettings {
        max_iterations: parsed.agent.max_iterations.unwrap_or(3),
        planner_version: parsed
            .agent
            .planner_version
            .unwrap_or_else(|| "v2".to_string()),
        memory_k: parsed.agent.memory_k.unwrap_or(3),
        memory_scan_limit: parsed.agent.memory_scan_limit.unwrap_or(50),
        summarize_max_sentences: parsed.agent.summarize_max_sentences.unwrap_or(2),
        sentence_tolerance: parsed.agent.sentence_tolerance.unwrap_or(1),
    };

    Ok(AppConfig {
        provider,
        data_dir: expand_path(parsed.data_dir.as_deref().unwrap_or("data")),
        prompts_dir: expand_path(parsed.prompts_dir.as_deref().unwrap_or("prompts")),
        agent,
    })
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("talos.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let (_tmp, path) = write_config("[provider]\nmodel = \"gpt-4o-mini\"\n");
        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.judge_model, "gpt-4o-mini");
        assert_eq!(config.provider.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.planner_version, "v2");
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let (_tmp, path) = write_config(
            r#"
data_dir = "state"
prompts_dir = "templates"

[provider]
model = "gpt-4o-mini"
judge_model = "gpt-4o"
endpoint = "http://localhost:8080/v1/chat/completions"
temperature = 0.7

[agent]
max_iterations = 5
sentence_tolerance = 2
"#,
        );
        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.provider.judge_model, "gpt-4o");
        assert_eq!(config.provider.temperature, 0.7);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.sentence_tolerance, 2);
        assert_eq!(config.data_dir, PathBuf::from("state"));
        assert_eq!(config.prompts_dir, PathBuf::from("templates"));
    }

    #[test]
    fn missing_model_is_rejected() {
        let (_tmp, path) = write_config("[provider]\ntemperature = 0.1\n");
        let error = load_config(Some(&path)).unwrap_err();
        assert!(matches!(error, ConfigError::MissingModel));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let error = load_config(Some(&tmp.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(error, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let (_tmp, path) = write_config("provider = not toml");
        let error = load_config(Some(&path)).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }
}
