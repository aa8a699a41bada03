//! Shared application state.

use chat2anyllm_core::ServerConfig;
use chat2anyllm_gateway::{GatewayConfig, LiteLlmClient};
use chat2anyllm_store::SqliteStore;

use crate::auth::TokenSigner;
use crate::error::ApiError;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// `None` when persistence is disabled.
    store: Option<SqliteStore>,
    pub gateway: LiteLlmClient,
    pub tokens: TokenSigner,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Option<SqliteStore>) -> anyhow::Result<Self> {
        let gateway = LiteLlmClient::new(GatewayConfig::new(
            config.litellm_endpoint.clone(),
            config.litellm_api_key.clone(),
        ))?;
        let tokens = TokenSigner::new(&config.jwt_secret, config.jwt_expires_in);

        Ok(Self {
            config,
            store,
            gateway,
            tokens,
        })
    }

    pub fn store(&self) -> Result<&SqliteStore, ApiError> {
        self.store.as_ref().ok_or(ApiError::DatabaseNotConfigured)
    }
}
