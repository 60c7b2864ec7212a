//! MCP protocol tests over HTTP: the authentication gate and JSON-RPC
//! dispatch as seen by a client.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use toolarr_mcp::config::Config;
use toolarr_mcp::server::transport::create_router;
use toolarr_mcp::tools::{ToolRegistry, builtin};

const API_KEY: &str = "test-api-key";

fn build_test_router() -> axum::Router {
    let mut registry = ToolRegistry::new();
    builtin::register_builtin_tools(&mut registry).unwrap();
    create_router(Config::for_testing(), registry)
}

fn bearer() -> String {
    format!("Bearer {API_KEY}")
}

fn basic(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

async fn post_mcp(app: &axum::Router, authorization: Option<&str>, body: impl Into<Body>) -> Response {
    let mut request = Request::post("/mcp").header("Content-Type", "application/json");
    if let Some(authorization) = authorization {
        request = request.header("Authorization", authorization);
    }
    app.clone().oneshot(request.body(body.into()).unwrap()).await.unwrap()
}

async fn rpc(app: &axum::Router, body: Value) -> Value {
    let response = post_mcp(app, Some(&bearer()), body.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ─── Authentication gate ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_authorization_is_401() {
    let app = build_test_router();
    // Not even valid JSON: the gate must answer before the body is parsed.
    let response = post_mcp(&app, None, "{{{ not json").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
    assert!(challenge.starts_with("Bearer"));
    assert!(challenge.contains("https://gateway.example.com/.well-known/oauth-protected-resource"));
}

#[tokio::test]
async fn test_wrong_credentials_are_401() {
    let app = build_test_router();
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string();

    for authorization in [
        "Bearer wrong-key".to_string(),
        "Bearer test-api-keyX".to_string(),
        basic("static-client", "static-secretX"),
        basic("mcp-unknown", "whatever"),
        "Basic %%%".to_string(),
        "Token abc".to_string(),
    ] {
        let response = post_mcp(&app, Some(&authorization), body.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{authorization}");
    }
}

#[tokio::test]
async fn test_static_basic_credentials_accepted() {
    let app = build_test_router();
    let response = post_mcp(
        &app,
        Some(&basic("static-client", "static-secret")),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "whoami"}}).to_string(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rpc: Value = serde_json::from_slice(&body).unwrap();
    let whoami: Value =
        serde_json::from_str(rpc["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(whoami["method"], "static-basic");
    assert_eq!(whoami["principal"], "static-client");
}

#[tokio::test]
async fn test_registered_client_basic_credentials_accepted() {
    let app = build_test_router();
    let response = app
        .clone()
        .oneshot(Request::post("/oauth/register").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let client: Value = serde_json::from_slice(&body).unwrap();
    let id = client["client_id"].as_str().unwrap();
    let secret = client["client_secret"].as_str().unwrap();

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string();
    let response = post_mcp(&app, Some(&basic(id, secret)), ping.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_mcp(&app, Some(&basic(id, &secret[..secret.len() - 1])), ping).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ─── JSON-RPC dispatch ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_initialize() {
    let app = build_test_router();
    let rpc = rpc(
        &app,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2025-06-18", "capabilities": {}}}),
    )
    .await;

    assert_eq!(rpc["jsonrpc"], "2.0");
    assert_eq!(rpc["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(rpc["result"]["capabilities"]["tools"]["listChanged"], true);
    assert_eq!(rpc["result"]["serverInfo"]["name"], "toolarr-mcp");
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let app = build_test_router();
    let rpc = rpc(
        &app,
        json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "nonexistent_tool", "arguments": {}}}),
    )
    .await;

    assert_eq!(rpc["id"], 5);
    assert_eq!(rpc["error"]["code"], -32602);
    assert!(rpc.get("result").is_none());
}

#[tokio::test]
async fn test_tool_failure_is_in_band() {
    let app = build_test_router();
    let rpc = rpc(
        &app,
        json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": "echo", "arguments": {"message": 42}}}),
    )
    .await;

    assert!(rpc.get("error").is_none());
    assert_eq!(rpc["result"]["isError"], true);
    assert_eq!(rpc["result"]["content"][0]["type"], "text");
}

#[tokio::test]
async fn test_parse_error() {
    let app = build_test_router();
    let response = post_mcp(&app, Some(&bearer()), "{\"jsonrpc\": \"2.0\",").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rpc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(rpc["error"]["code"], -32700);
    assert_eq!(rpc["id"], Value::Null);
}

#[tokio::test]
async fn test_invalid_request() {
    let app = build_test_router();
    let rpc = rpc(&app, json!({"jsonrpc": "2.0", "id": "abc", "method": 7})).await;
    assert_eq!(rpc["error"]["code"], -32600);
    assert_eq!(rpc["id"], "abc");
}

#[tokio::test]
async fn test_method_not_found() {
    let app = build_test_router();
    let rpc = rpc(&app, json!({"jsonrpc": "2.0", "id": 1, "method": "completion/complete"})).await;
    assert_eq!(rpc["error"]["code"], -32601);
}

#[tokio::test]
async fn test_ping_and_listings() {
    let app = build_test_router();

    let ping = rpc(&app, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(ping["result"], json!({}));

    let resources = rpc(&app, json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
    assert_eq!(resources["result"]["resources"], json!([]));

    let prompts = rpc(&app, json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"})).await;
    assert_eq!(prompts["result"]["prompts"], json!([]));
}

#[tokio::test]
async fn test_notification_gets_202_without_body() {
    let app = build_test_router();
    let response = post_mcp(
        &app,
        Some(&bearer()),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

// ─── SSE ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sse_requires_auth() {
    let app = build_test_router();
    let response =
        app.oneshot(Request::get("/mcp/sse").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sse_announces_endpoint_then_heartbeats() {
    let app = build_test_router();
    let response = app
        .oneshot(
            Request::get("/mcp/sse").header("Authorization", bearer()).body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let mut frames = response.into_body().into_data_stream();

    let first = frames.next().await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.contains("event: endpoint"));
    assert!(first.contains("https://gateway.example.com/mcp"));

    let second = frames.next().await.unwrap().unwrap();
    let second = String::from_utf8(second.to_vec()).unwrap();
    assert!(second.contains("event: heartbeat"));
    assert!(second.contains("timestamp"));
}
