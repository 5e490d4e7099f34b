use std::path::PathBuf;
use thiserror::Error;

use talos_core::application::agent::AgentError;
use talos_core::application::eval::JudgeError;
use talos_core::application::tooling::RegistryError;
use talos_core::config::ConfigError;
use talos_core::infrastructure::model::ProviderError;
use talos_core::infrastructure::store::StoreError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Judge(#[from] JudgeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io failure at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
