//! Model discovery through the aggregator.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chat2anyllm_gateway::{fallback_models, normalize_models, ModelInfo};
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/models/normalized", get(list_normalized))
}

/// GET /api/models: the aggregator's payload, untouched.
async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let info = state
        .gateway
        .model_info()
        .await
        .map_err(|e| ApiError::gateway("Failed to fetch models", e))?;
    Ok(Json(info))
}

/// GET /api/models/normalized: `[{ id, object, litellm_provider }]`, never an error.
async fn list_normalized(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    match state.gateway.model_info().await {
        Ok(info) => Json(normalize_models(&info)),
        Err(e) => {
            warn!(error = %e, "model info unavailable, serving fallback list");
            Json(fallback_models())
        }
    }
}
