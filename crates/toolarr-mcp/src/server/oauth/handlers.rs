//! OAuth 2.0 endpoint handlers.
//!
//! Thin axum adapters over [`AuthorizationServer`]:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 6749: Authorization Code (with RFC 7636 PKCE) and Client Credentials grants

use std::sync::Arc;

use axum::{
    Form, Json,
    body::Bytes,
    extract::{Query, State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::authorization::{
    AuthorizationServer, AuthorizeRejection, AuthorizeRequest, RegisterRequest, TokenRequest,
    TokenResponse,
};
use crate::error::OAuthError;
use crate::server::auth::Credentials;
use crate::server::transport::HttpState;

fn oauth(state: &HttpState) -> &AuthorizationServer {
    &state.oauth
}

/// `GET /.well-known/oauth-protected-resource`
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(oauth(&state).protected_resource_metadata())
}

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(oauth(&state).metadata())
}

/// `POST /oauth/register`
///
/// An empty body registers a client with default metadata.
pub async fn handle_register(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RegisterRequest::default()
    } else {
        match serde_json::from_slice::<RegisterRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return OAuthError::invalid_request(format!("Invalid registration body: {e}"))
                    .into_response();
            }
        }
    };

    let registration = oauth(&state).register(request).await;
    (StatusCode::CREATED, no_store(Json(registration).into_response())).into_response()
}

/// `GET /oauth/authorize`
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeRequest>,
) -> Response {
    match oauth(&state).authorize(query).await {
        Ok(location) | Err(AuthorizeRejection::Redirect(location)) => {
            (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
        }
        Err(AuthorizeRejection::BadRequest(error)) => error.into_response(),
    }
}

/// `POST /oauth/token`
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Ok(Form(request)) = form else {
        return OAuthError::invalid_request("Token request must be form-encoded").into_response();
    };
    let credentials = Credentials::from_headers(&headers).ok();

    match oauth(&state).token(request, credentials).await {
        Ok(token) => token_success(token),
        Err(error) => error.into_response(),
    }
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(token: TokenResponse) -> Response {
    let mut response = no_store(Json(token).into_response());
    response.headers_mut().insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn no_store(mut response: Response) -> Response {
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
