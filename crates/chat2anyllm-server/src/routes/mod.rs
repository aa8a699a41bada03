//! HTTP route handlers under `/api`.

pub mod commands;
pub mod health;
pub mod login;
pub mod models;
pub mod proxy;
pub mod roles;
pub mod sessions;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::{middleware, Json, Router};
use chat2anyllm_core::{FieldError, Location};
use uuid::Uuid;

use crate::auth::require_auth;
use crate::error::ApiError;
use crate::middleware::{cors_layer, log_requests, with_security_headers};
use crate::state::AppState;

/// Request bodies above this size are rejected with 413.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .nest("/api", api_routes(state.clone()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&state.config.cors));

    // Outside CORS so preflight answers carry the headers too.
    with_security_headers(router)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .merge(sessions::routes())
        .merge(roles::routes())
        .merge(commands::routes())
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .merge(health::routes())
        .merge(login::routes())
        .merge(models::routes())
        .merge(proxy::routes())
        .merge(protected)
}

/// Unwrap a JSON body, turning extractor rejections into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(ApiError::from)
}

/// Path ids must be UUIDs; anything else is a validation error.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::Validation(vec![FieldError::new("id", Location::Params, "Invalid value")])
    })
}

/// Wrap a relayed byte stream as a `text/event-stream` response.
pub(crate) fn event_stream(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
