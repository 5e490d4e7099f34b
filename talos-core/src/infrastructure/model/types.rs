use thiserror::Error;

/// Token and cost totals for one or more generation calls. Owned and
/// threaded by the caller; there is no shared global counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub tokens: u64,
    pub cost: f64,
}

impl Usage {
    pub fn new(tokens: u64, cost: f64) -> Self {
        Self { tokens, cost }
    }

    pub fn add(&mut self, other: Usage) {
        self.tokens += other.tokens;
        self.cost += other.cost;
    }
}

/// One raw model completion plus what it cost.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// Provider-level faults. All variants are treated as transient by the
/// structured-output retry policy.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' requires an API key (env {env})")]
    MissingApiKey { provider: String, env: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned HTTP status {status}")]
    Http { provider: String, status: u16 },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ProviderError {
    pub fn missing_api_key(provider: impl Into<String>, env: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
            env: env.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn http(provider: impl Into<String>, status: u16) -> Self {
        Self::Http {
            provider: provider.into(),
            status,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
