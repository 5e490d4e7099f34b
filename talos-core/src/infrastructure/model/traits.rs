use async_trait::async_trait;

use super::types::{Completion, ProviderError};

/// Seam to a text-generation backend. Implementations must be safe to call
/// repeatedly with the same prompt; retry policy lives in the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError>;
}
