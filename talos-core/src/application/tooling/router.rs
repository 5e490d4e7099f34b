use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{ToolCall, ToolOutcome};

use super::cache::{ToolCache, cache_key};
use super::{Tool, ToolFailure};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Allowlist-based dispatcher with content-addressed result caching.
///
/// `run` never fails at the call level: every fault, from an unknown
/// tool to bad arguments to a malformed tool output, comes back as a
/// failed `ToolOutcome`. Cache faults degrade to a miss on read and to an
/// uncached (but successful) call on write.
pub struct ToolRouter {
    tools: HashMap<String, Arc<dyn Tool>>,
    cache: Arc<dyn ToolCache>,
}

impl ToolRouter {
    pub fn new(cache: Arc<dyn ToolCache>) -> Self {
        Self {
            tools: HashMap::new(),
            cache,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn run(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.tool_name) else {
            warn!(tool = %call.tool_name, "unknown tool requested");
            return ToolOutcome::failed(&call.tool_name, "Unknown tool");
        };

        let key = cache_key(&call.tool_name, &call.args);
        match self.cache.get(&key).await {
            Ok(Some(data)) => {
                debug!(tool = %call.tool_name, key = %key, "tool cache hit");
                return ToolOutcome::succeeded(&call.tool_name, data);
            }
            Ok(None) => {
                debug!(tool = %call.tool_name, key = %key, "tool cache miss");
            }
            Err(error) => {
                warn!(
                    tool = %call.tool_name,
                    key = %key,
                    error = %error,
                    "cache read failed, treating as miss"
                );
            }
        }

        let outcome = match tool.invoke(call.args.clone()).await {
            Ok(Value::Object(data)) => ToolOutcome::succeeded(&call.tool_name, data),
            Ok(_) => ToolOutcome::failed(&call.tool_name, "Tool returned non-dict output"),
            Err(ToolFailure::BadArgs(detail)) => {
                ToolOutcome::failed(&call.tool_name, format!("Bad tool args: {detail}"))
            }
            Err(ToolFailure::Failed { kind, detail }) => {
                ToolOutcome::failed(&call.tool_name, format!("Tool error: {kind}: {detail}"))
            }
        };

        if outcome.ok {
            if let Some(data) = &outcome.data {
                if let Err(error) = self.cache.put(&key, data).await {
                    warn!(
                        tool = %call.tool_name,
                        key = %key,
                        error = %error,
                        "cache write failed, returning result uncached"
                    );
                }
            }
        }

        outcome
    }
}
