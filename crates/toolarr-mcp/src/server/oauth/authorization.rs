//! OAuth 2.0 authorization server operations.
//!
//! Implements dynamic client registration, an auto-approving authorization
//! endpoint with S256 PKCE, and a token endpoint supporting the
//! `authorization_code` and `client_credentials` grants. HTTP concerns live in
//! [`super::handlers`]; everything here is plain async logic over the stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::pkce;
use super::store::{AuthorizationCodeStore, ClientStore, TokenStore};
use super::types::CodeChallengeMethod;
use crate::config::Config;
use crate::error::{OAuthError, OAuthResult};
use crate::server::auth::{AuthVerifier, Credentials};

/// Name given to clients that register without one.
pub const DEFAULT_CLIENT_NAME: &str = "MCP Client";

/// `POST /oauth/register` body. Unknown RFC 7591 metadata is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
}

/// Dynamic registration response (RFC 7591 §3.2.1).
#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub client_id_issued_at: i64,
    pub grant_types: Vec<&'static str>,
    pub token_endpoint_auth_method: &'static str,
    pub scope: String,
}

/// `GET /oauth/authorize` query.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Why an authorization request was refused.
#[derive(Debug)]
pub enum AuthorizeRejection {
    /// Redirect back to the (allow-listed) client with `error` parameters.
    Redirect(Url),
    /// No trustworthy redirect target; answer directly.
    BadRequest(OAuthError),
}

/// `POST /oauth/token` form body.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub scope: String,
}

/// The embedded authorization server.
#[derive(Clone)]
pub struct AuthorizationServer {
    config: Arc<Config>,
    clients: ClientStore,
    codes: AuthorizationCodeStore,
    tokens: TokenStore,
    verifier: AuthVerifier,
}

impl AuthorizationServer {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        clients: ClientStore,
        codes: AuthorizationCodeStore,
        tokens: TokenStore,
    ) -> Self {
        let verifier = AuthVerifier::new(&config, clients.clone(), tokens.clone());
        Self { config, clients, codes, tokens, verifier }
    }

    /// Verifier sharing this server's stores.
    #[must_use]
    pub fn verifier(&self) -> AuthVerifier {
        self.verifier.clone()
    }

    // ─── RFC 7591: Dynamic Client Registration ───────────────────────────────

    /// Register a client. Always succeeds; names are not deduplicated.
    pub async fn register(&self, request: RegisterRequest) -> RegistrationResponse {
        let client_name = request
            .client_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string());
        let scopes = BTreeSet::from([self.config.default_scope.clone()]);

        let client = self.clients.register(client_name, scopes).await;

        tracing::info!(client_id = %client.client_id, client_name = %client.client_name, "Registered OAuth client");

        RegistrationResponse {
            client_id: client.client_id,
            client_secret: client.client_secret,
            client_name: client.client_name,
            client_id_issued_at: client.created_at.timestamp(),
            grant_types: vec!["client_credentials"],
            token_endpoint_auth_method: "client_secret_basic",
            scope: client.scopes.into_iter().collect::<Vec<_>>().join(" "),
        }
    }

    // ─── Authorization Endpoint ──────────────────────────────────────────────

    /// Auto-approve an authorization request and return the redirect carrying
    /// `code` and `state`.
    ///
    /// There is no consent step: callers are trusted agent integrations, and
    /// any known client id (static or registered) is accepted.
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<Url, AuthorizeRejection> {
        let Some(redirect_uri) = request.redirect_uri.as_deref() else {
            return Err(AuthorizeRejection::BadRequest(OAuthError::invalid_request(
                "Missing redirect_uri",
            )));
        };
        if !self.config.is_allowed_redirect(redirect_uri) {
            tracing::warn!(redirect_uri = %redirect_uri, "Rejected authorization for unlisted redirect_uri");
            return Err(AuthorizeRejection::BadRequest(OAuthError::invalid_request(
                "redirect_uri is not allowed",
            )));
        }
        let redirect = Url::parse(redirect_uri).map_err(|_| {
            AuthorizeRejection::BadRequest(OAuthError::invalid_request("redirect_uri is not a URL"))
        })?;
        let state = request.state.as_deref();

        if request.response_type.as_deref() != Some("code") {
            return Err(error_redirect(
                redirect,
                &OAuthError::UnsupportedResponseType("response_type must be 'code'".into()),
                state,
            ));
        }

        if request.code_challenge_method.as_deref().and_then(CodeChallengeMethod::parse).is_none() {
            return Err(error_redirect(
                redirect,
                &OAuthError::invalid_request("code_challenge_method must be 'S256'"),
                state,
            ));
        }

        let Some(code_challenge) = request.code_challenge.as_deref().filter(|c| !c.is_empty())
        else {
            return Err(error_redirect(
                redirect,
                &OAuthError::invalid_request("Missing code_challenge"),
                state,
            ));
        };

        let client_id = match request.client_id.as_deref() {
            Some(id) if self.verifier.is_known_client(id).await => id,
            _ => {
                return Err(error_redirect(
                    redirect,
                    &OAuthError::invalid_client("Unknown client_id"),
                    state,
                ));
            }
        };

        let scope = request
            .scope
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_scope);

        let code = self
            .codes
            .issue(
                client_id.to_owned(),
                redirect_uri.to_owned(),
                scope.to_owned(),
                code_challenge.to_owned(),
            )
            .await;

        tracing::info!(client_id = %client_id, "Auto-approved authorization");

        let mut location = redirect;
        {
            let mut query = location.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(location)
    }

    // ─── Token Endpoint ──────────────────────────────────────────────────────

    /// Exchange a grant for a bearer token.
    ///
    /// `credentials` is the request's parsed `Authorization` header, used by the
    /// `client_credentials` grant.
    pub async fn token(
        &self,
        request: TokenRequest,
        credentials: Option<Credentials>,
    ) -> OAuthResult<TokenResponse> {
        match request.grant_type.as_deref() {
            Some("authorization_code") => self.authorization_code_grant(request).await,
            Some("client_credentials") => self.client_credentials_grant(request, credentials).await,
            Some(other) => Err(OAuthError::UnsupportedGrantType(format!(
                "grant_type '{other}' is not supported"
            ))),
            None => Err(OAuthError::invalid_request("Missing grant_type")),
        }
    }

    async fn authorization_code_grant(&self, request: TokenRequest) -> OAuthResult<TokenResponse> {
        let code = request.code.ok_or_else(|| OAuthError::invalid_request("Missing code"))?;

        // Consume the code first: any failed attempt below still burns it.
        let Some(auth_code) = self.codes.redeem(&code).await else {
            return Err(OAuthError::invalid_grant("Invalid or already used authorization code"));
        };

        let code_verifier = request
            .code_verifier
            .ok_or_else(|| OAuthError::invalid_request("Missing code_verifier"))?;
        let redirect_uri = request
            .redirect_uri
            .ok_or_else(|| OAuthError::invalid_request("Missing redirect_uri"))?;

        if auth_code.is_expired() {
            return Err(OAuthError::invalid_grant("Authorization code expired"));
        }

        if redirect_uri != auth_code.redirect_uri {
            return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
        }

        if request.client_id.is_some_and(|id| id != auth_code.client_id) {
            return Err(OAuthError::invalid_grant("client_id mismatch"));
        }

        if !pkce::verify_s256(&code_verifier, &auth_code.code_challenge) {
            tracing::warn!(client_id = %auth_code.client_id, "PKCE verification failed");
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }

        Ok(self.issue_token(&auth_code.client_id, &auth_code.scope).await)
    }

    async fn client_credentials_grant(
        &self,
        request: TokenRequest,
        credentials: Option<Credentials>,
    ) -> OAuthResult<TokenResponse> {
        let Some(Credentials::Basic { client_id, client_secret }) = credentials else {
            return Err(OAuthError::invalid_client("Client authentication required"));
        };

        if self.verifier.verify_basic(&client_id, &client_secret).await.is_none() {
            tracing::warn!(client_id = %client_id, "Client credentials rejected");
            return Err(OAuthError::invalid_client("Invalid client credentials"));
        }

        let scope = request
            .scope
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.config.default_scope.clone());

        Ok(self.issue_token(&client_id, &scope).await)
    }

    async fn issue_token(&self, client_id: &str, scope: &str) -> TokenResponse {
        let token = self.tokens.issue(client_id, scope).await;

        tracing::info!(client_id = %client_id, "Issued access token");

        TokenResponse {
            access_token: token.access_token,
            token_type: "Bearer",
            expires_in: self.tokens.lifetime().as_secs(),
            scope: token.scope,
        }
    }

    // ─── Discovery ───────────────────────────────────────────────────────────

    /// RFC 8414 authorization server metadata.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        let base = &self.config.base_url;
        serde_json::json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/oauth/authorize"),
            "token_endpoint": format!("{base}/oauth/token"),
            "registration_endpoint": format!("{base}/oauth/register"),
            "scopes_supported": [self.config.default_scope],
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "client_credentials"],
            "token_endpoint_auth_methods_supported": ["client_secret_basic", "none"],
            "code_challenge_methods_supported": ["S256"]
        })
    }

    /// RFC 9728 protected resource metadata for the MCP endpoint.
    #[must_use]
    pub fn protected_resource_metadata(&self) -> serde_json::Value {
        let base = &self.config.base_url;
        serde_json::json!({
            "resource": format!("{base}/mcp"),
            "authorization_servers": [base],
            "bearer_methods_supported": ["header"],
            "scopes_supported": [self.config.default_scope]
        })
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer").field("issuer", &self.config.base_url).finish()
    }
}

fn error_redirect(mut redirect: Url, error: &OAuthError, state: Option<&str>) -> AuthorizeRejection {
    tracing::warn!(error = %error, "Authorization request rejected");
    {
        let mut query = redirect.query_pairs_mut();
        query.append_pair("error", error.code());
        query.append_pair("error_description", error.description());
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    AuthorizeRejection::Redirect(redirect)
}
