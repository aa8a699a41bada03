//! Chat sessions, their message history, and streaming chat within a session.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chat2anyllm_core::validate::{escape_html, truncate_chars, Validator};
use chat2anyllm_core::{FieldError, Location};
use chat2anyllm_gateway::{apply_role, chat_body, ChatMessage};
use chat2anyllm_store::{Message, MessageRole, Session};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{event_stream, json_body, parse_id};
use crate::error::ApiError;
use crate::relay::spawn_relay;
use crate::state::AppState;

pub const DEFAULT_TITLE: &str = "New Chat";

/// Characters of the first message used as the session title.
const TITLE_FROM_MESSAGE_CHARS: usize = 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/messages", get(list_messages))
        .route("/sessions/{id}/chat/stream", post(chat_stream))
}

/// GET /api/sessions: most recently active first.
async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Session>>, ApiError> {
    Ok(Json(state.store()?.list_sessions()?))
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    title: Option<String>,
}

/// POST /api/sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let req = match payload {
        Ok(Json(req)) => req,
        // A bare POST without a body creates an untitled session.
        Err(JsonRejection::MissingJsonContentType(_)) => CreateSessionRequest::default(),
        Err(e) => return Err(e.into()),
    };

    let mut v = Validator::new();
    let title = v.optional("title", req.title.as_deref(), 1, 120);
    v.finish().map_err(ApiError::Validation)?;

    let title = title.map(|t| escape_html(&t)).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let session = state.store()?.create_session(&title)?;
    info!(session = %session.id, "created session");
    Ok((StatusCode::CREATED, Json(session)))
}

/// DELETE /api/sessions/{id}: messages go with it.
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if !state.store()?.delete_session(id)? {
        return Err(ApiError::NotFound("Session not found".into()));
    }
    info!(session = %id, "deleted session");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/{id}/messages: oldest first; unknown sessions are empty.
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store()?.list_messages(id)?))
}

#[derive(Debug, Deserialize)]
struct SessionChatRequest {
    message: Option<String>,
    model: Option<String>,
    role_id: Option<String>,
}

/// POST /api/sessions/{id}/chat/stream
///
/// Saves the user message, sends the whole history upstream and relays the
/// SSE reply. The assistant reply is saved once the upstream stream ends.
async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SessionChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let session_id = parse_id(&id)?;
    let req = json_body(payload)?;

    let mut v = Validator::new();
    let message = v.required("message", req.message.as_deref(), 1, 10_000);
    let model = v.optional("model", req.model.as_deref(), 1, 100);
    let role_id = match req.role_id.as_deref() {
        Some(raw) => match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                v.push(FieldError::new("role_id", Location::Body, "Invalid value"));
                None
            }
        },
        None => None,
    };
    v.finish().map_err(ApiError::Validation)?;
    let message = message.ok_or_else(|| ApiError::BadRequest("Missing message".into()))?;

    let store = state.store()?;
    if store.get_session(session_id)?.is_none() {
        return Err(ApiError::NotFound("Session not found".into()));
    }
    let role = match role_id {
        Some(role_id) => Some(
            store
                .get_role(role_id)?
                .ok_or_else(|| ApiError::NotFound("Role not found".into()))?,
        ),
        None => None,
    };

    store.add_message(session_id, MessageRole::User, &message)?;
    if store.count_messages(session_id)? == 1 {
        let title = truncate_chars(message.trim(), TITLE_FROM_MESSAGE_CHARS);
        let title = if title.is_empty() { DEFAULT_TITLE } else { title };
        store.rename_session(session_id, title)?;
    }

    let history: Vec<ChatMessage> = store
        .list_messages(session_id)?
        .into_iter()
        .map(|m| ChatMessage::new(m.role.as_str(), m.content))
        .collect();
    let history = match &role {
        Some(role) => apply_role(history, &role.instructions),
        None => history,
    };

    let upstream = state
        .gateway
        .open_stream(chat_body(model.as_deref(), &history, true))
        .await
        .map_err(|e| ApiError::gateway("Session streaming failed", e))?;

    Ok(event_stream(Body::from_stream(spawn_relay(
        state.clone(),
        session_id,
        upstream,
    ))))
}
