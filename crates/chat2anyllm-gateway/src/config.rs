//! Aggregator connection settings.

use std::time::Duration;

pub const MODELS_TIMEOUT: Duration = Duration::from_secs(10);
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://localhost:4141`. Trailing slashes are removed.
    pub endpoint: String,
    pub api_key: String,
    /// Total timeout for `/v1/model/info`.
    pub models_timeout: Duration,
    /// Total timeout for non-streaming completions, and the time allowed for
    /// a streaming completion to start answering.
    pub completion_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models_timeout: MODELS_TIMEOUT,
            completion_timeout: COMPLETION_TIMEOUT,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn model_info_url(&self) -> String {
        format!("{}/v1/model/info", self.endpoint)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }
}
