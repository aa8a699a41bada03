//! Role presets: named system instructions applied to chats.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chat2anyllm_core::validate::{escape_html, Validator};
use chat2anyllm_store::{Role, RoleUpdate};
use serde::Deserialize;
use tracing::info;

use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::state::AppState;

const NAME_MAX: usize = 100;
const INSTRUCTIONS_MAX: usize = 5000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", put(update_role).delete(delete_role))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    name: Option<String>,
    instructions: Option<String>,
}

/// GET /api/roles: sorted by name.
async fn list_roles(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.store()?.list_roles()?))
}

/// POST /api/roles
async fn create_role(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let req = json_body(payload)?;

    let mut v = Validator::new();
    let name = v.required("name", req.name.as_deref(), 1, NAME_MAX);
    let instructions = v.required("instructions", req.instructions.as_deref(), 1, INSTRUCTIONS_MAX);
    v.finish().map_err(ApiError::Validation)?;

    let (Some(name), Some(instructions)) = (name, instructions) else {
        return Err(ApiError::BadRequest("Missing name or instructions".into()));
    };

    let role = state.store()?.create_role(&escape_html(&name), &instructions)?;
    info!(role = %role.id, name = %role.name, "created role");
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/roles/{id}: either field may be omitted, not both.
async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Json<Role>, ApiError> {
    let id = parse_id(&id)?;
    let req = json_body(payload)?;

    let mut v = Validator::new();
    let name = v.optional("name", req.name.as_deref(), 1, NAME_MAX);
    let instructions = v.optional("instructions", req.instructions.as_deref(), 1, INSTRUCTIONS_MAX);
    v.finish().map_err(ApiError::Validation)?;

    let update = RoleUpdate {
        name: name.map(|n| escape_html(&n)),
        instructions,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }

    let role = state
        .store()?
        .update_role(id, &update)?
        .ok_or_else(|| ApiError::NotFound("Role not found".into()))?;
    info!(role = %role.id, "updated role");
    Ok(Json(role))
}

/// DELETE /api/roles/{id}
async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if !state.store()?.delete_role(id)? {
        return Err(ApiError::NotFound("Role not found".into()));
    }
    info!(role = %id, "deleted role");
    Ok(StatusCode::NO_CONTENT)
}
