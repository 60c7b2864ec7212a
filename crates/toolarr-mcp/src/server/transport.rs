//! HTTP transport.
//!
//! Serves the OAuth endpoints unauthenticated and gates the MCP endpoints
//! (`POST /mcp`, `GET /mcp/sse`) behind [`require_auth`]. The gate runs as a
//! route layer, so a rejected request is answered before its body is read.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use futures::stream::Stream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::{AuthContext, AuthVerifier, require_auth};
use super::oauth::handlers;
use super::oauth::{AuthorizationCodeStore, AuthorizationServer, ClientStore, TokenStore};
use super::rpc::RpcDispatcher;
use crate::config::Config;
use crate::tools::ToolRegistry;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Arc<Config>,
    pub verifier: AuthVerifier,
    pub oauth: AuthorizationServer,
    pub dispatcher: RpcDispatcher,
}

impl HttpState {
    /// Build state with fresh, default-lifetime stores.
    #[must_use]
    pub fn new(config: Config, registry: ToolRegistry) -> Self {
        Self::with_stores(
            config,
            registry,
            ClientStore::new(),
            AuthorizationCodeStore::new(),
            TokenStore::new(),
        )
    }

    /// Build state around caller-supplied stores.
    #[must_use]
    pub fn with_stores(
        config: Config,
        registry: ToolRegistry,
        clients: ClientStore,
        codes: AuthorizationCodeStore,
        tokens: TokenStore,
    ) -> Self {
        let config = Arc::new(config);
        let oauth = AuthorizationServer::new(Arc::clone(&config), clients, codes, tokens);
        Self {
            verifier: oauth.verifier(),
            dispatcher: RpcDispatcher::new(Arc::new(registry)),
            config,
            oauth,
        }
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("base_url", &self.config.base_url)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Create the HTTP router with fresh stores.
pub fn create_router(config: Config, registry: ToolRegistry) -> Router {
    router(Arc::new(HttpState::new(config, registry)))
}

/// Create the HTTP router over existing state.
pub fn router(state: Arc<HttpState>) -> Router {
    let mcp = Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/mcp/sse", get(handle_sse))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_auth));

    Router::new()
        .route("/.well-known/oauth-authorization-server", get(handlers::handle_auth_server_metadata))
        .route("/.well-known/oauth-protected-resource", get(handlers::handle_protected_resource))
        .route("/oauth/register", post(handlers::handle_register))
        .route("/oauth/authorize", get(handlers::handle_authorize))
        .route("/oauth/token", post(handlers::handle_token))
        .merge(mcp)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /mcp`: one JSON-RPC message in, one out. Notifications get 202.
async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    Extension(auth): Extension<AuthContext>,
    body: Bytes,
) -> Response {
    match state.dispatcher.dispatch(&body, &auth).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `GET /mcp/sse`: announces the message endpoint, then heartbeats forever.
async fn handle_sse(
    State(state): State<Arc<HttpState>>,
    Extension(auth): Extension<AuthContext>,
) -> impl IntoResponse {
    tracing::info!(principal = %auth.principal, method = ?auth.method, "New SSE stream connection");

    let endpoint = format!("{}/mcp", state.config.base_url);
    let stream = heartbeat_stream(endpoint, state.config.heartbeat_interval);

    (
        [("X-Accel-Buffering", "no"), ("Cache-Control", "no-cache, no-store, must-revalidate")],
        Sse::new(stream),
    )
}

fn heartbeat_stream(
    endpoint: String,
    interval: std::time::Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint));

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let payload = serde_json::json!({ "timestamp": Utc::now().to_rfc3339() });
            yield Ok(Event::default().event("heartbeat").data(payload.to_string()));
        }
    }
}
