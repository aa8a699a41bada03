//! API parity tests: response shapes and status codes the chat UI relies on.
//!
//! Each test builds the full router over an in-memory store and a fake
//! LiteLLM aggregator listening on an ephemeral port, then drives it with
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chat2anyllm_core::ServerConfig;
use chat2anyllm_server::{build_router, AppState};
use chat2anyllm_store::SqliteStore;
use serde_json::{json, Value};
use tower::ServiceExt;

// ---------------------------------------------------------------
// Harness
// ---------------------------------------------------------------

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn delta(content: &str) -> String {
    json!({ "choices": [{ "index": 0, "delta": { "content": content } }] }).to_string()
}

/// Streams `Hello there`, preceded by an SSE comment echoing the messages
/// it was sent. Non-streaming calls echo the whole request body.
async fn fake_completion(Json(body): Json<Value>) -> Response {
    if body["stream"] == true {
        let sse = format!(
            ": messages={}\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            body["messages"],
            delta("Hello"),
            delta(" there")
        );
        ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
    } else {
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "ok" } }],
            "echo": body,
        }))
        .into_response()
    }
}

async fn fake_litellm() -> String {
    let router = Router::new()
        .route(
            "/v1/model/info",
            get(|| async {
                Json(json!({
                    "data": [
                        { "model_name": "gpt-4o", "litellm_params": { "custom_llm_provider": "openai" } },
                        { "model_name": "claude-3-haiku", "model_info": { "litellm_provider": "anthropic" } }
                    ]
                }))
            }),
        )
        .route("/v1/chat/completions", post(fake_completion));
    serve(router).await
}

/// Rejects everything: 503 for model info, 400 for completions.
async fn failing_litellm() -> String {
    let router = Router::new()
        .route(
            "/v1/model/info",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
        )
        .route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "message": "model not found" } })),
                )
            }),
        );
    serve(router).await
}

/// Sends one delta, then fails the body before `[DONE]`.
async fn aborting_litellm() -> String {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let chunks = futures::stream::iter(vec![
                Ok(Bytes::from(format!("data: {}\n\n", delta("Partial")))),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "model crashed",
                )),
            ]);
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(chunks),
            )
        }),
    );
    serve(router).await
}

async fn unreachable_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn app(endpoint: &str, store: Option<SqliteStore>) -> Router {
    let config = ServerConfig::from_lookup(|key| match key {
        "LITELLM_ENDPOINT" => Some(endpoint.to_string()),
        "LITELLM_API_KEY" => Some("sk-test".to_string()),
        "JWT_SECRET" => Some("test-secret".to_string()),
        "DATABASE_PATH" => Some(String::new()),
        _ => None,
    })
    .unwrap();
    build_router(Arc::new(AppState::new(config, store).unwrap()))
}

async fn app_with_store(endpoint: &str) -> Router {
    app(endpoint, Some(SqliteStore::open_in_memory().unwrap()))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, req).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn login(app: &Router) -> String {
    let (status, body) = send_json(
        app,
        request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "alice", "password": "secret" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create_session(app: &Router, token: &str) -> String {
    let (status, body) = send_json(
        app,
        request(Method::POST, "/api/sessions", Some(token), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_role(app: &Router, token: &str, name: &str, instructions: &str) -> Value {
    let (status, body) = send_json(
        app,
        request(
            Method::POST,
            "/api/roles",
            Some(token),
            Some(json!({ "name": name, "instructions": instructions })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

// ---------------------------------------------------------------
// Health, login and auth
// ---------------------------------------------------------------

/// GET /api/health → { status: "OK", timestamp } with security headers.
#[tokio::test]
async fn test_health_shape_and_headers() {
    let app = app(&unreachable_endpoint().await, None);
    let (status, headers, bytes) = send(&app, request(Method::GET, "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert!(headers.contains_key("content-security-policy"));
}

/// POST /api/login → { token, user: { id, username, role } }.
#[tokio::test]
async fn test_login_shape() {
    let app = app(&unreachable_endpoint().await, None);
    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "  <bob>  ", "password": "pw" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);
    assert_eq!(body["user"], json!({ "id": 1, "username": "&lt;bob&gt;", "role": "user" }));
}

#[tokio::test]
async fn test_login_validation() {
    let app = app(&unreachable_endpoint().await, None);
    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "alice", "password": "   " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["path"], "password");
    assert_eq!(body["errors"][0]["location"], "body");
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = app_with_store(&unreachable_endpoint().await).await;

    for uri in ["/api/sessions", "/api/roles"] {
        let (status, body) = send_json(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Access token required");

        let (status, body) = send_json(&app, request(Method::GET, uri, Some("not.a.token"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    let (status, _) = send_json(
        &app,
        request(Method::POST, "/api/commands", None, Some(json!({ "input": "/roles" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Persistence routes answer 500 when the server runs without a database.
#[tokio::test]
async fn test_database_not_configured() {
    let app = app(&unreachable_endpoint().await, None);
    let token = login(&app).await;
    let (status, body) = send_json(&app, request(Method::GET, "/api/sessions", Some(&token), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Database not configured");
}

// ---------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&app).await;

    let (status, untitled) = send_json(
        &app,
        request(Method::POST, "/api/sessions", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(untitled["title"], "New Chat");

    let (status, titled) = send_json(
        &app,
        request(
            Method::POST,
            "/api/sessions",
            Some(&token),
            Some(json!({ "title": " Trip <plans> " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(titled["title"], "Trip &lt;plans&gt;");
    for field in ["id", "title", "created_at", "updated_at"] {
        assert!(titled[field].is_string(), "missing {}", field);
    }

    let (_, list) = send_json(&app, request(Method::GET, "/api/sessions", Some(&token), None)).await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let uri = format!("/api/sessions/{}", titled["id"].as_str().unwrap());
    let (status, _) = send_json(&app, request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send_json(&app, request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn test_session_title_validation() {
    let app = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&app).await;
    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/sessions",
            Some(&token),
            Some(json!({ "title": "x".repeat(121) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["path"], "title");
}

#[tokio::test]
async fn test_non_uuid_path_is_rejected() {
    let app = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&app).await;
    let (status, body) = send_json(
        &app,
        request(Method::GET, "/api/sessions/not-a-uuid/messages", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], json!({ "path": "id", "location": "params", "msg": "Invalid value" }));
}

// ---------------------------------------------------------------
// Session chat stream
// ---------------------------------------------------------------

#[tokio::test]
async fn test_session_chat_stream_persists_both_sides() {
    let app = app_with_store(&fake_litellm().await).await;
    let token = login(&app).await;
    let id = create_session(&app, &token).await;

    let message = "Plan a three day trip to Lisbon with a focus on food and old trams please";
    let (status, headers, bytes) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", id),
            Some(&token),
            Some(json!({ "message": message, "model": "gpt-4o" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");

    let raw = String::from_utf8(bytes).unwrap();
    assert_eq!(raw.matches("data: [DONE]").count(), 1);
    assert!(raw.contains(&delta("Hello")));

    let (_, messages) = send_json(
        &app,
        request(Method::GET, &format!("/api/sessions/{}/messages", id), Some(&token), None),
    )
    .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], message);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hello there");
    for field in ["id", "role", "content", "timestamp"] {
        assert!(messages[1].get(field).is_some(), "missing {}", field);
    }

    let (_, sessions) = send_json(&app, request(Method::GET, "/api/sessions", Some(&token), None)).await;
    let title = sessions[0]["title"].as_str().unwrap();
    assert_eq!(title.chars().count(), 60);
    assert!(message.starts_with(title));
}

#[tokio::test]
async fn test_session_chat_sends_history_and_role() {
    let app = app_with_store(&fake_litellm().await).await;
    let token = login(&app).await;
    let id = create_session(&app, &token).await;
    let role = create_role(&app, &token, "Pirate", "Talk like a pirate.").await;
    let uri = format!("/api/sessions/{}/chat/stream", id);

    send(&app, request(Method::POST, &uri, Some(&token), Some(json!({ "message": "first" })))).await;
    let (status, _, bytes) = send(
        &app,
        request(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "message": "second", "role_id": role["id"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let raw = String::from_utf8(bytes).unwrap();
    let echoed = raw
        .lines()
        .find_map(|l| l.strip_prefix(": messages="))
        .unwrap();
    let sent: Vec<Value> = serde_json::from_str(echoed).unwrap();
    let roles: Vec<&str> = sent.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert_eq!(sent[0]["content"], "Talk like a pirate.");
    assert_eq!(sent[3]["content"], "second");

    // The session keeps the title taken from the first message.
    let (_, sessions) = send_json(&app, request(Method::GET, "/api/sessions", Some(&token), None)).await;
    assert_eq!(sessions[0]["title"], "first");
}

#[tokio::test]
async fn test_session_chat_errors() {
    let app = app_with_store(&fake_litellm().await).await;
    let token = login(&app).await;
    let id = create_session(&app, &token).await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", uuid::Uuid::new_v4()),
            Some(&token),
            Some(json!({ "message": "hi" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");

    let uri = format!("/api/sessions/{}/chat/stream", id);
    let (status, body) = send_json(
        &app,
        request(Method::POST, &uri, Some(&token), Some(json!({ "message": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["path"], "message");

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "message": "hi", "role_id": uuid::Uuid::new_v4().to_string() })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Role not found");
}

#[tokio::test]
async fn test_session_chat_upstream_failures() {
    let failing = app_with_store(&failing_litellm().await).await;
    let token = login(&failing).await;
    let id = create_session(&failing, &token).await;
    let (status, body) = send_json(
        &failing,
        request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", id),
            Some(&token),
            Some(json!({ "message": "hi" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session streaming failed");
    assert_eq!(body["details"]["error"]["message"], "model not found");

    let offline = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&offline).await;
    let id = create_session(&offline, &token).await;
    let (status, body) = send_json(
        &offline,
        request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", id),
            Some(&token),
            Some(json!({ "message": "hi" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to connect to LiteLLM");
    assert!(body["message"].is_string());
}

/// The reply is saved even when the client stops reading mid-stream.
#[tokio::test]
async fn test_reply_saved_after_client_disconnect() {
    let app = app_with_store(&fake_litellm().await).await;
    let token = login(&app).await;
    let id = create_session(&app, &token).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", id),
            Some(&token),
            Some(json!({ "message": "hi" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    let uri = format!("/api/sessions/{}/messages", id);
    let mut saved = Value::Null;
    for _ in 0..100 {
        let (_, messages) = send_json(&app, request(Method::GET, &uri, Some(&token), None)).await;
        if messages.as_array().map(Vec::len) == Some(2) {
            saved = messages;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(saved[1]["content"], "Hello there");
}

#[tokio::test]
async fn test_reply_not_saved_when_upstream_breaks() {
    let app = app_with_store(&aborting_litellm().await).await;
    let token = login(&app).await;
    let id = create_session(&app, &token).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/sessions/{}/chat/stream", id),
            Some(&token),
            Some(json!({ "message": "hi" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!String::from_utf8_lossy(&body).contains("[DONE]"));

    // The response only ends once the relay has given up.
    let (_, messages) = send_json(
        &app,
        request(Method::GET, &format!("/api/sessions/{}/messages", id), Some(&token), None),
    )
    .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "hi");
}

// ---------------------------------------------------------------
// Roles and commands
// ---------------------------------------------------------------

#[tokio::test]
async fn test_role_lifecycle() {
    let app = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&app).await;

    let zed = create_role(&app, &token, "Zed", "Be brief.").await;
    create_role(&app, &token, "Analyst", "Think in numbers.").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/roles",
            Some(&token),
            Some(json!({ "name": "Zed", "instructions": "again" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Role name already exists");

    let (_, list) = send_json(&app, request(Method::GET, "/api/roles", Some(&token), None)).await;
    let names: Vec<&str> = list.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Analyst", "Zed"]);

    let uri = format!("/api/roles/{}", zed["id"].as_str().unwrap());
    let (status, body) = send_json(&app, request(Method::PUT, &uri, Some(&token), Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Nothing to update");

    let (status, body) = send_json(
        &app,
        request(Method::PUT, &uri, Some(&token), Some(json!({ "instructions": "Be very brief." }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Zed");
    assert_eq!(body["instructions"], "Be very brief.");

    let (status, body) = send_json(
        &app,
        request(Method::PUT, &uri, Some(&token), Some(json!({ "name": "Analyst" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Role name already exists");

    let missing = format!("/api/roles/{}", uuid::Uuid::new_v4());
    let (status, body) = send_json(
        &app,
        request(Method::PUT, &missing, Some(&token), Some(json!({ "name": "Ghost" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Role not found");

    let (status, _) = send_json(&app, request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send_json(&app, request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_commands() {
    let app = app_with_store(&unreachable_endpoint().await).await;
    let token = login(&app).await;

    let run = |input: &'static str| {
        let app = app.clone();
        let token = token.clone();
        async move {
            send_json(
                &app,
                request(Method::POST, "/api/commands", Some(&token), Some(json!({ "input": input }))),
            )
            .await
        }
    };

    let (status, body) = run("/roles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "No roles defined.");

    create_role(&app, &token, "Pirate", "Arr.").await;
    create_role(&app, &token, "Analyst", "Numbers.").await;

    let (_, body) = run("/roles").await;
    assert_eq!(body["text"], "Roles:\n• Analyst\n• Pirate");

    let (_, body) = run("/role pirate").await;
    assert_eq!(body["text"], "Selected role: Pirate");
    assert_eq!(body["role"]["instructions"], "Arr.");

    let (_, body) = run("/role Ninja").await;
    assert_eq!(body["text"], "Role not found: Ninja");
    assert!(body.get("role").is_none());

    let (_, body) = run("/role").await;
    assert_eq!(body["text"], "Usage: /role <name>");

    let (_, body) = run("/dance").await;
    assert_eq!(body["text"], "Unknown command");

    let (status, _) = run("hello there").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------
// Models and proxy
// ---------------------------------------------------------------

#[tokio::test]
async fn test_models_passthrough_and_normalized() {
    let app = app(&fake_litellm().await, None);

    let (status, raw) = send_json(&app, request(Method::GET, "/api/models", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(raw["data"][0]["model_name"], "gpt-4o");

    let (status, models) = send_json(&app, request(Method::GET, "/api/models/normalized", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        models,
        json!([
            { "id": "gpt-4o", "object": "model", "litellm_provider": "openai" },
            { "id": "claude-3-haiku", "object": "model", "litellm_provider": "anthropic" }
        ])
    );
}

#[tokio::test]
async fn test_models_upstream_failure() {
    let failing = app(&failing_litellm().await, None);

    let (status, body) = send_json(&failing, request(Method::GET, "/api/models", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Failed to fetch models");
    assert_eq!(body["details"], "upstream down");

    let (status, models) = send_json(&failing, request(Method::GET, "/api/models/normalized", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models.as_array().unwrap().len(), 5);
    assert_eq!(models[0]["id"], "gpt-3.5-turbo");

    let offline = app(&unreachable_endpoint().await, None);
    let (status, body) = send_json(&offline, request(Method::GET, "/api/models", None, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to connect to LiteLLM");
}

#[tokio::test]
async fn test_completion_proxy_applies_role() {
    let app = app_with_store(&fake_litellm().await).await;
    let token = login(&app).await;
    let role = create_role(&app, &token, "Pirate", "Talk like a pirate.").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/chat/completions",
            None,
            Some(json!({
                "model": "gpt-4o",
                "temperature": 0.2,
                "role_id": role["id"],
                "messages": [{ "role": "user", "content": "hi" }]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let echo = &body["echo"];
    assert!(echo.get("role_id").is_none());
    assert_eq!(echo["temperature"], 0.2);
    assert_eq!(echo["messages"][0], json!({ "role": "system", "content": "Talk like a pirate." }));
    assert_eq!(echo["messages"][1]["content"], "hi");

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/chat/completions",
            None,
            Some(json!({ "role_id": "nope", "messages": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["path"], "role_id");
}

#[tokio::test]
async fn test_completion_proxy_relays_upstream_error() {
    let app = app(&failing_litellm().await, None);
    let (status, body) = send_json(
        &app,
        request(Method::POST, "/api/chat/completions", None, Some(json!({ "messages": [] }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Chat completion failed");
    assert_eq!(body["details"]["error"]["message"], "model not found");

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/chat/completions/stream",
            None,
            Some(json!({ "messages": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Streaming chat completion failed");
}

#[tokio::test]
async fn test_stream_proxy_relays_raw_bytes() {
    let app = app(&fake_litellm().await, None);
    let (status, headers, bytes) = send(
        &app,
        request(
            Method::POST,
            "/api/chat/completions/stream",
            None,
            Some(json!({ "model": "gpt-4o", "messages": [{ "role": "user", "content": "hi" }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");

    let raw = String::from_utf8(bytes).unwrap();
    assert!(raw.starts_with(": messages="));
    assert!(raw.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn test_body_limit() {
    let app = app(&unreachable_endpoint().await, None);
    let big = "x".repeat(11 * 1024 * 1024);
    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/api/chat/completions",
            None,
            Some(json!({ "messages": [{ "role": "user", "content": big }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ---------------------------------------------------------------
// CORS
// ---------------------------------------------------------------

#[tokio::test]
async fn test_cors_allowlist() {
    let app = app(&unreachable_endpoint().await, None);

    let with_origin = |origin: &str| {
        Request::builder()
            .method(Method::GET)
            .uri("/api/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    };

    let (_, headers, _) = send(&app, with_origin("http://localhost:5173")).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    // Same hostname on another port.
    let (_, headers, _) = send(&app, with_origin("http://LOCALHOST:8080")).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://LOCALHOST:8080");

    let (_, headers, _) = send(&app, with_origin("https://evil.example")).await;
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    // Preflight is answered before auth and still carries the security headers.
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/sessions")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, preflight).await;
    assert!(status.is_success());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
}
