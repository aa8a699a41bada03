//! Cross-cutting layers: CORS, security headers and request logging.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use chat2anyllm_core::CorsPolicy;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, info_span, warn, Instrument};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
     script-src 'self'; img-src 'self' data: https:";

pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    match policy {
        CorsPolicy::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any),
        CorsPolicy::Allowlist { .. } => {
            let policy = policy.clone();
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
                    let allowed = origin.to_str().map(|o| policy.allows(o)).unwrap_or(false);
                    if !allowed {
                        warn!(origin = ?origin, "blocked CORS origin; set ALLOWED_ORIGINS or CORS_ALLOW_ALL=true");
                    }
                    allowed
                }))
                .allow_credentials(true)
                .allow_headers(AllowHeaders::mirror_request())
                .allow_methods(AllowMethods::mirror_request())
        }
    }
}

/// Static security headers on every response unless a handler set them.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}

/// Log method, path and origin on the way in; status and latency on the way
/// out. Bodies are never buffered so streams pass through untouched.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!(origin = %origin, "→ request started");
        let response = next.run(req).await;
        info!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "← response head sent"
        );
        response
    }
    .instrument(span)
    .await
}
