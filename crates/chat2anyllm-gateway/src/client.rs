//! HTTP client for the LiteLLM aggregator.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Raw upstream body, relayed to the caller chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LiteLlmClient {
    http: Client,
    config: GatewayConfig,
}

impl LiteLlmClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// `GET /v1/model/info`, returned untouched.
    pub async fn model_info(&self) -> Result<Value> {
        let url = self.config.model_info_url();
        debug!("Fetching models from {}", url);

        let request = self
            .with_key(self.http.get(&url))
            .header("accept", "application/json")
            .timeout(self.config.models_timeout);

        let response = send(request).await?;
        read_json(response).await
    }

    /// Non-streaming `POST /v1/chat/completions`.
    pub async fn complete(&self, body: &Value) -> Result<Value> {
        let url = self.config.completions_url();
        debug!("Forwarding chat completion to {}", url);

        let request = self
            .with_auth(self.http.post(&url))
            .json(body)
            .timeout(self.config.completion_timeout);

        let response = send(request).await?;
        read_json(response).await
    }

    /// Streaming `POST /v1/chat/completions` with `"stream": true` forced.
    ///
    /// Only the wait for the response head is bounded; the body may stream
    /// for as long as the model keeps generating.
    pub async fn open_stream(&self, mut body: Value) -> Result<ByteStream> {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("stream".into(), Value::Bool(true));
        }
        let url = self.config.completions_url();
        debug!("Opening completion stream to {}", url);

        let request = self.with_auth(self.http.post(&url)).json(&body);
        let response = tokio::time::timeout(self.config.completion_timeout, send(request))
            .await
            .map_err(|_| {
                GatewayError::Connect(format!(
                    "timeout of {}ms exceeded",
                    self.config.completion_timeout.as_millis()
                ))
            })??;

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                warn!("Stream error: {}", e);
                GatewayError::Connect(format!("Stream read error: {}", e))
            })
        });
        Ok(Box::pin(stream))
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        if self.config.has_api_key() {
            request.header("x-litellm-api-key", &self.config.api_key)
        } else {
            request
        }
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let request = self.with_key(request).header("Content-Type", "application/json");
        if self.config.has_api_key() {
            request.bearer_auth(&self.config.api_key)
        } else {
            request
        }
    }
}

/// Send and classify: transport failures become `Connect`, non-2xx become
/// `Upstream` with the body preserved.
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(|e| {
        warn!("Failed to reach LiteLLM: {}", e);
        GatewayError::Connect(e.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    warn!("LiteLLM responded with status {}: {}", status, text);
    Err(GatewayError::Upstream {
        status: status.as_u16(),
        body: upstream_body(&text),
    })
}

async fn read_json(response: Response) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// JSON bodies stay structured; anything else is kept as text.
fn upstream_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
