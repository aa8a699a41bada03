//! Bearer-token authentication.
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`.
//! There is no user database; any non-empty credentials log in as user 1.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// The identity carried in a token and returned by `/api/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: u64,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: 1,
            username: username.into(),
            role: "user".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub user: AuthUser,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    Signature,
    #[error("token expired")]
    Expired,
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl,
        }
    }

    pub fn issue(&self, user: &AuthUser) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        self.issue_at(user, now)
    }

    fn issue_at(&self, user: &AuthUser, now: i64) -> Result<String, ApiError> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| ApiError::Internal(format!("token lifetime too large: {:?}", self.ttl)))?;
        let claims = Claims {
            user: user.clone(),
            iat: now,
            exp,
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| ApiError::Internal(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mac = self
            .mac(&signing_input)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", signing_input, signature))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;

        let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| TokenError::Malformed)?;
        let header: serde_json::Value =
            serde_json::from_slice(&header).map_err(|_| TokenError::Malformed)?;
        if header["alg"] != "HS256" {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;
        self.mac(signing_input)
            .map_err(|_| TokenError::Signature)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, input: &str) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)?;
        mac.update(input.as_bytes());
        Ok(mac)
    }
}

/// Middleware guarding the persistence routes. Verified claims are stored as
/// a request extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "rejected bearer token");
        ApiError::Forbidden("Invalid or expired token".into())
    })?;

    req.extensions_mut().insert(claims.user);
    Ok(next.run(req).await)
}
