//! HTTP error type.
//!
//! Handlers return `Result<T, ApiError>`; the `IntoResponse` impl picks the
//! status and JSON body. Database and internal failures are logged in full
//! but answered with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat2anyllm_core::FieldError;
use chat2anyllm_gateway::GatewayError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    /// One or more request fields failed validation.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// The body could not be extracted (size limit, content type, syntax).
    #[error("rejected body: {message}")]
    Rejected { status: StatusCode, message: String },

    /// No bearer token was presented.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A token was presented but did not verify.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The server runs without a database.
    #[error("database not configured")]
    DatabaseNotConfigured,

    /// The aggregator answered with an error status; its body is relayed.
    #[error("{context}: upstream status {status}")]
    Upstream {
        context: &'static str,
        status: u16,
        details: Value,
    },

    /// The aggregator could not be reached or returned garbage.
    #[error("failed to connect to LiteLLM: {0}")]
    Connect(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Classify a gateway failure under a caller-facing context message.
    pub fn gateway(context: &'static str, err: GatewayError) -> Self {
        match err {
            GatewayError::Upstream { status, body } => Self::Upstream {
                context,
                status,
                details: body,
            },
            other => {
                warn!(error = %other, "{}", context);
                Self::Connect(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, json!({ "errors": errors })),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
            ApiError::Rejected { status, message } => (status, json!({ "error": message })),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, json!({ "error": m })),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, json!({ "error": m })),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
            ApiError::DatabaseNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Database not configured" }),
            ),
            ApiError::Upstream {
                context,
                status,
                details,
            } => {
                warn!(status, "{}", context);
                (
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    json!({ "error": context, "details": details }),
                )
            }
            ApiError::Connect(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to connect to LiteLLM", "message": message }),
            ),
            ApiError::Database(m) => {
                error!(error = %m, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            ApiError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<chat2anyllm_core::Error> for ApiError {
    fn from(e: chat2anyllm_core::Error) -> Self {
        use chat2anyllm_core::Error;
        match e {
            Error::NotFound(m) => ApiError::NotFound(m),
            Error::Conflict(m) => ApiError::Conflict(m),
            Error::Invalid(m) => ApiError::BadRequest(m),
            Error::Database(m) => ApiError::Database(m),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}
