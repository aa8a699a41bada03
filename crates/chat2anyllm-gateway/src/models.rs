//! Model list normalisation for `/v1/model/info` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A selectable model as the UI lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub litellm_provider: String,
}

impl ModelInfo {
    fn new(id: &str, provider: &str) -> Self {
        Self {
            id: id.to_string(),
            object: "model".to_string(),
            litellm_provider: provider.to_string(),
        }
    }
}

/// Models offered when the aggregator cannot be reached or answers with
/// something unrecognisable.
pub fn fallback_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new("gpt-3.5-turbo", "openai"),
        ModelInfo::new("gpt-4", "openai"),
        ModelInfo::new("claude-3-haiku-20240307", "anthropic"),
        ModelInfo::new("claude-3-sonnet-20240229", "anthropic"),
        ModelInfo::new("gemini-pro", "vertex_ai"),
    ]
}

/// Normalise `{ data: [...] }`, a bare array, or a single model object.
pub fn normalize_models(payload: &Value) -> Vec<ModelInfo> {
    if let Some(entries) = payload.get("data").and_then(Value::as_array) {
        return entries
            .iter()
            .filter_map(|m| {
                first_str(m, &["model_name", "id"]).map(|id| ModelInfo::new(id, provider_of(m)))
            })
            .collect();
    }

    if let Some(entries) = payload.as_array() {
        return entries
            .iter()
            .filter_map(|m| {
                first_str(m, &["id", "model_name", "name"])
                    .map(|id| ModelInfo::new(id, provider_of(m)))
            })
            .collect();
    }

    if let Some(id) = first_str(payload, &["id", "model_name"]) {
        return vec![ModelInfo::new(id, provider_of(payload))];
    }

    warn!("Unexpected model info response format, using fallback models");
    fallback_models()
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn provider_of(model: &Value) -> &str {
    [
        &model["litellm_params"]["custom_llm_provider"],
        &model["model_info"]["litellm_provider"],
        &model["litellm_params"]["litellm_provider"],
        &model["litellm_provider"],
    ]
    .into_iter()
    .filter_map(Value::as_str)
    .find(|s| !s.is_empty())
    .unwrap_or("openai")
}
