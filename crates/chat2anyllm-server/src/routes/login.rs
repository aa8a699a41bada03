//! Login: any non-empty credentials yield a signed token.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chat2anyllm_core::validate::{escape_html, Validator};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: AuthUser,
}

/// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(payload)?;

    let mut v = Validator::new();
    let username = v.required("username", req.username.as_deref(), 1, 50);
    let password = v.required("password", req.password.as_deref(), 1, 100);
    v.finish().map_err(ApiError::Validation)?;

    let (Some(username), Some(_)) = (username, password) else {
        return Err(ApiError::BadRequest("Username and password required".into()));
    };

    let user = AuthUser::new(escape_html(&username));
    let token = state.tokens.issue(&user)?;
    info!(username = %user.username, "issued token");

    Ok(Json(LoginResponse { token, user }))
}
