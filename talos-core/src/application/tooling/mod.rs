mod builtin;
mod cache;
mod router;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::JsonMap;

pub use builtin::{SUMMARIZE_TOOL, SummarizeText};
pub use cache::{CacheError, FsCache, MemoryCache, ToolCache, cache_key};
pub use router::{RegistryError, ToolRouter};

/// A side-effecting capability the planner may invoke. Implementations
/// deserialize their own argument struct from the supplied object and
/// report every failure through `ToolFailure`; the router guarantees no
/// failure escapes to its caller.
///
/// Tools must be deterministic enough that identical arguments are safe
/// to serve from the cache.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, args: JsonMap) -> Result<Value, ToolFailure>;
}

#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The argument object did not match the tool's expected shape.
    #[error("{0}")]
    BadArgs(String),
    /// The tool ran and failed.
    #[error("{kind}: {detail}")]
    Failed { kind: String, detail: String },
}

impl ToolFailure {
    pub fn bad_args(detail: impl Into<String>) -> Self {
        Self::BadArgs(detail.into())
    }

    pub fn failed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}
