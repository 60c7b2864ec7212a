//! Credential verification for MCP endpoints.
//!
//! A request is accepted when its `Authorization` header carries, in order of
//! precedence:
//! 1. the static pre-shared bearer key,
//! 2. a live bearer token issued by the token endpoint,
//! 3. the static client id/secret pair as Basic credentials,
//! 4. a dynamically registered client's id/secret as Basic credentials.
//!
//! All comparisons are exact. Undecodable headers count as a failed match.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{
    Authorization, Header,
    authorization::{Basic, Bearer},
};
use serde::Serialize;

use super::oauth::store::{ClientStore, TokenStore};
use super::transport::HttpState;
use crate::config::Config;
use crate::error::AuthFailure;

/// Principal reported for callers using the static bearer key.
pub const STATIC_KEY_PRINCIPAL: &str = "api-key";

/// Credential material carried by an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { client_id: String, client_secret: String },
}

impl Credentials {
    /// Parse the `Authorization` header.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthFailure> {
        if !headers.contains_key(header::AUTHORIZATION) {
            return Err(AuthFailure::MissingCredentials);
        }

        if let Ok(bearer) =
            Authorization::<Bearer>::decode(&mut headers.get_all(header::AUTHORIZATION).iter())
        {
            return Ok(Self::Bearer(bearer.token().to_owned()));
        }

        if let Ok(basic) =
            Authorization::<Basic>::decode(&mut headers.get_all(header::AUTHORIZATION).iter())
        {
            return Ok(Self::Basic {
                client_id: basic.username().to_owned(),
                client_secret: basic.password().to_owned(),
            });
        }

        Err(AuthFailure::Unauthorized)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Credentials::Bearer(..)"),
            Self::Basic { client_id, .. } => {
                f.debug_struct("Credentials::Basic").field("client_id", client_id).finish()
            }
        }
    }
}

/// How a request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    StaticBearer,
    DcrBearer,
    StaticBasic,
    DcrBasic,
}

/// Who made a request and how they proved it. Passed opaquely to tool handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub method: AuthMethod,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AuthContext {
    #[must_use]
    pub fn new(method: AuthMethod, principal: impl Into<String>) -> Self {
        Self { method, principal: principal.into(), scope: None }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Decides whether credential material is acceptable.
#[derive(Clone)]
pub struct AuthVerifier {
    api_key: Option<String>,
    static_client: Option<(String, String)>,
    clients: ClientStore,
    tokens: TokenStore,
}

impl AuthVerifier {
    #[must_use]
    pub fn new(config: &Config, clients: ClientStore, tokens: TokenStore) -> Self {
        Self {
            api_key: config.api_key.clone(),
            static_client: config
                .static_client()
                .map(|(id, secret)| (id.to_owned(), secret.to_owned())),
            clients,
            tokens,
        }
    }

    pub async fn verify(&self, credentials: &Credentials) -> Result<AuthContext, AuthFailure> {
        let context = match credentials {
            Credentials::Bearer(token) => self.verify_bearer(token).await,
            Credentials::Basic { client_id, client_secret } => {
                self.verify_basic(client_id, client_secret).await
            }
        };
        context.ok_or(AuthFailure::Unauthorized)
    }

    /// Static key first, then issued tokens.
    pub async fn verify_bearer(&self, token: &str) -> Option<AuthContext> {
        if self.api_key.as_deref() == Some(token) {
            return Some(AuthContext::new(AuthMethod::StaticBearer, STATIC_KEY_PRINCIPAL));
        }

        self.tokens.validate(token).await.map(|issued| {
            AuthContext::new(AuthMethod::DcrBearer, issued.client_id).with_scope(issued.scope)
        })
    }

    /// Static client pair first, then registered clients.
    pub async fn verify_basic(&self, client_id: &str, client_secret: &str) -> Option<AuthContext> {
        if let Some((id, secret)) = &self.static_client {
            if id == client_id && secret == client_secret {
                return Some(AuthContext::new(AuthMethod::StaticBasic, client_id));
            }
        }

        self.clients
            .authenticate(client_id, client_secret)
            .await
            .map(|client| AuthContext::new(AuthMethod::DcrBasic, client.client_id))
    }

    /// Whether `client_id` names the static client or a registered one.
    pub async fn is_known_client(&self, client_id: &str) -> bool {
        self.static_client.as_ref().is_some_and(|(id, _)| id == client_id)
            || self.clients.lookup(client_id).await.is_some()
    }
}

impl std::fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerifier")
            .field("static_key", &self.api_key.is_some())
            .field("static_client", &self.static_client.as_ref().map(|(id, _)| id))
            .finish()
    }
}

/// Middleware guarding the MCP routes. Stores the [`AuthContext`] in request
/// extensions on success; answers 401 before the body is read otherwise.
pub async fn require_auth(
    State(state): State<Arc<HttpState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = match Credentials::from_headers(request.headers()) {
        Ok(credentials) => state.verifier.verify(&credentials).await,
        Err(failure) => Err(failure),
    };

    match verified {
        Ok(context) => {
            tracing::debug!(method = ?context.method, principal = %context.principal, "Authenticated");
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(failure) => {
            tracing::warn!(path = %request.uri().path(), reason = %failure, "Rejected unauthenticated request");
            unauthorized(&state.config.base_url, failure)
        }
    }
}

fn unauthorized(base_url: &str, failure: AuthFailure) -> Response {
    let challenge = format!(
        r#"Bearer resource_metadata="{base_url}/.well-known/oauth-protected-resource""#
    );
    let challenge =
        HeaderValue::from_str(&challenge).unwrap_or_else(|_| HeaderValue::from_static("Bearer"));

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "error_description": failure.to_string()
        })),
    )
        .into_response();
    response.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
    response
}
