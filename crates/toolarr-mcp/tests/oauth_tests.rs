//! OAuth endpoint tests: discovery, registration, and request validation at
//! the authorize and token endpoints.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use toolarr_mcp::config::Config;
use toolarr_mcp::server::oauth::pkce;
use toolarr_mcp::server::transport::create_router;
use toolarr_mcp::tools::{ToolRegistry, builtin};

const REDIRECT: &str = "https://client.example.com/cb";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

fn build_test_router() -> axum::Router {
    let mut registry = ToolRegistry::new();
    builtin::register_builtin_tools(&mut registry).unwrap();
    create_router(Config::for_testing(), registry)
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::post("/oauth/register")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

fn authorize_uri(params: &[(&str, &str)]) -> String {
    format!("/oauth/authorize?{}", serde_urlencoded::to_string(params).unwrap())
}

fn location_params(response: &Response) -> HashMap<String, String> {
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    url::Url::parse(location).unwrap().query_pairs().into_owned().collect()
}

async fn post_token(app: &axum::Router, params: &[(&str, &str)]) -> Response {
    app.clone()
        .oneshot(
            Request::post("/oauth/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(serde_urlencoded::to_string(params).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ─── Discovery ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authorization_server_metadata() {
    let app = build_test_router();
    let response = app
        .oneshot(Request::get("/.well-known/oauth-authorization-server").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let metadata = json_body(response).await;
    assert_eq!(metadata["issuer"], "https://gateway.example.com");
    assert_eq!(metadata["authorization_endpoint"], "https://gateway.example.com/oauth/authorize");
    assert_eq!(metadata["token_endpoint"], "https://gateway.example.com/oauth/token");
    assert_eq!(metadata["registration_endpoint"], "https://gateway.example.com/oauth/register");
    assert_eq!(metadata["response_types_supported"], json!(["code"]));
    assert_eq!(
        metadata["grant_types_supported"],
        json!(["authorization_code", "client_credentials"])
    );
    assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256"]));
}

#[tokio::test]
async fn test_protected_resource_metadata() {
    let app = build_test_router();
    let response = app
        .oneshot(Request::get("/.well-known/oauth-protected-resource").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let metadata = json_body(response).await;
    assert_eq!(metadata["resource"], "https://gateway.example.com/mcp");
    assert_eq!(metadata["authorization_servers"], json!(["https://gateway.example.com"]));
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_response_shape() {
    let app = build_test_router();
    let client = register(&app, json!({"client_name": "Sonarr Agent"})).await;

    assert!(client["client_id"].as_str().unwrap().starts_with("mcp-"));
    assert!(client["client_secret"].as_str().unwrap().len() >= 32);
    assert!(client["client_id_issued_at"].as_i64().unwrap() > 0);
    assert_eq!(client["client_name"], "Sonarr Agent");
    assert_eq!(client["grant_types"], json!(["client_credentials"]));
    assert_eq!(client["token_endpoint_auth_method"], "client_secret_basic");
    assert_eq!(client["scope"], "mcp");
}

#[tokio::test]
async fn test_register_without_body_uses_default_name() {
    let app = build_test_router();
    let response = app
        .oneshot(Request::post("/oauth/register").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(json_body(response).await["client_name"], "MCP Client");
}

#[tokio::test]
async fn test_register_same_name_twice_gives_distinct_clients() {
    let app = build_test_router();
    let a = register(&app, json!({"client_name": "Agent"})).await;
    let b = register(&app, json!({"client_name": "Agent"})).await;

    assert_ne!(a["client_id"], b["client_id"]);
    assert_ne!(a["client_secret"], b["client_secret"]);
}

#[tokio::test]
async fn test_register_rejects_malformed_json() {
    let app = build_test_router();
    let response = app
        .oneshot(
            Request::post("/oauth/register")
                .header("Content-Type", "application/json")
                .body(Body::from("{\"client_name\":"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

// ─── Authorize ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_unlisted_redirect_is_400() {
    let app = build_test_router();
    let challenge = pkce::challenge_s256(VERIFIER);
    let uri = authorize_uri(&[
        ("response_type", "code"),
        ("client_id", "static-client"),
        ("redirect_uri", "https://attacker.example.net/cb"),
        ("scope", "mcp"),
        ("state", "s1"),
        ("code_challenge", &challenge),
        ("code_challenge_method", "S256"),
    ]);

    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_missing_redirect_is_400() {
    let app = build_test_router();
    let uri = authorize_uri(&[("response_type", "code"), ("client_id", "static-client")]);

    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authorize_error_redirects() {
    let app = build_test_router();
    let challenge = pkce::challenge_s256(VERIFIER);

    let cases = [
        ("response_type", "token", "unsupported_response_type"),
        ("code_challenge_method", "plain", "invalid_request"),
        ("client_id", "mcp-does-not-exist", "invalid_client"),
    ];

    for (field, value, expected) in cases {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", "static-client"),
            ("redirect_uri", REDIRECT),
            ("scope", "mcp"),
            ("state", "opaque-state"),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        for param in &mut params {
            if param.0 == field {
                param.1 = value;
            }
        }

        let response = app
            .clone()
            .oneshot(Request::get(&authorize_uri(&params)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND, "case {field}={value}");

        let query = location_params(&response);
        assert_eq!(query["error"], expected, "case {field}={value}");
        assert!(query.contains_key("error_description"));
        assert_eq!(query["state"], "opaque-state");
        assert!(!query.contains_key("code"));
    }
}

#[tokio::test]
async fn test_authorize_preserves_existing_query_and_encodes_state() {
    let mut config = Config::for_testing();
    config.allowed_redirect_uris.push("https://client.example.com/cb?tenant=a".into());
    let app = create_router(config, ToolRegistry::new());

    let challenge = pkce::challenge_s256(VERIFIER);
    let uri = authorize_uri(&[
        ("response_type", "code"),
        ("client_id", "static-client"),
        ("redirect_uri", "https://client.example.com/cb?tenant=a"),
        ("scope", "mcp"),
        ("state", "a b&c=d"),
        ("code_challenge", &challenge),
        ("code_challenge_method", "S256"),
    ]);

    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let query = location_params(&response);
    assert_eq!(query["tenant"], "a");
    assert_eq!(query["state"], "a b&c=d");
    assert!(!query["code"].is_empty());
}

// ─── Token ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_unsupported_grant_type() {
    let app = build_test_router();
    let response = post_token(&app, &[("grant_type", "password")]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_missing_parameters() {
    let app = build_test_router();

    let response = post_token(&app, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");

    let response =
        post_token(&app, &[("grant_type", "authorization_code"), ("redirect_uri", REDIRECT)]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_token_unknown_code_is_invalid_grant() {
    let app = build_test_router();
    let response = post_token(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", "never-issued"),
            ("redirect_uri", REDIRECT),
            ("code_verifier", VERIFIER),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_client_credentials_without_authentication_is_401() {
    let app = build_test_router();
    let response = post_token(&app, &[("grant_type", "client_credentials")]).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(json_body(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_requires_form_encoding() {
    let app = build_test_router();
    let response = app
        .oneshot(
            Request::post("/oauth/token")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"grant_type": "client_credentials"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}
