//! Pass-through chat completions.
//!
//! Bodies are forwarded as opaque JSON. The one field the proxy understands is
//! `role_id`: it is removed and the role's instructions are prepended as a
//! system message.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chat2anyllm_core::{FieldError, Location};
use chat2anyllm_gateway::apply_role_to_body;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{event_stream, json_body};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/completions", post(complete))
        .route("/chat/completions/stream", post(complete_stream))
}

/// POST /api/chat/completions
async fn complete(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut body = json_body(payload)?;
    apply_requested_role(&state, &mut body)?;

    let reply = state
        .gateway
        .complete(&body)
        .await
        .map_err(|e| ApiError::gateway("Chat completion failed", e))?;
    Ok(Json(reply))
}

/// POST /api/chat/completions/stream: upstream SSE bytes relayed verbatim.
async fn complete_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let mut body = json_body(payload)?;
    apply_requested_role(&state, &mut body)?;

    let stream = state
        .gateway
        .open_stream(body)
        .await
        .map_err(|e| ApiError::gateway("Streaming chat completion failed", e))?;
    Ok(event_stream(Body::from_stream(stream)))
}

/// Strip `role_id` from the body and, when it names a role, prepend that
/// role's instructions.
fn apply_requested_role(state: &AppState, body: &mut Value) -> Result<(), ApiError> {
    let Some(raw) = body.as_object_mut().and_then(|obj| obj.remove("role_id")) else {
        return Ok(());
    };
    if raw.is_null() {
        return Ok(());
    }

    let role_id = raw
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            ApiError::Validation(vec![FieldError::new("role_id", Location::Body, "Invalid value")])
        })?;

    let role = state
        .store()?
        .get_role(role_id)?
        .ok_or_else(|| ApiError::NotFound("Role not found".into()))?;

    debug!(role = %role.name, "applying role to completion request");
    apply_role_to_body(body, &role.instructions);
    Ok(())
}
