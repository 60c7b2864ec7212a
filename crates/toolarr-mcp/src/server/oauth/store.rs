//! In-memory OAuth stores.
//!
//! Each store wraps one map behind a `tokio::sync::RwLock`, so every
//! insert/lookup/delete is atomic with respect to the others. Stores are
//! cheap to clone (shared `Arc`) and are injected where needed. Expired
//! entries are evicted lazily on access; there is no background sweep.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;

use super::types::{AuthorizationCode, CodeChallengeMethod, RegisteredClient, Token};
use crate::config::defaults;

/// Prefix on dynamically issued client ids.
pub const CLIENT_ID_PREFIX: &str = "mcp-";

/// Generate a random token using two UUIDs (244 random bits).
fn generate_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

// ─── Clients ─────────────────────────────────────────────────────────────────

/// Dynamically registered clients, keyed by client id.
#[derive(Clone, Default)]
pub struct ClientStore {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
}

impl ClientStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client with a fresh id and secret.
    pub async fn register(&self, client_name: String, scopes: BTreeSet<String>) -> RegisteredClient {
        let mut clients = self.clients.write().await;

        let client_id = loop {
            let candidate = format!("{CLIENT_ID_PREFIX}{}", uuid::Uuid::new_v4().simple());
            if !clients.contains_key(&candidate) {
                break candidate;
            }
        };

        let client = RegisteredClient {
            client_id: client_id.clone(),
            client_secret: generate_token(),
            client_name,
            created_at: Utc::now(),
            scopes,
        };
        clients.insert(client_id, client.clone());

        client
    }

    /// Look up a client by id.
    pub async fn lookup(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Return the client only if both id and secret match exactly.
    pub async fn authenticate(&self, client_id: &str, client_secret: &str) -> Option<RegisteredClient> {
        self.lookup(client_id).await.filter(|c| c.client_secret == client_secret)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl std::fmt::Debug for ClientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStore").finish()
    }
}

// ─── Authorization codes ─────────────────────────────────────────────────────

/// Short-lived, single-use authorization codes.
#[derive(Clone)]
pub struct AuthorizationCodeStore {
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    lifetime: Duration,
}

impl AuthorizationCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_lifetime(defaults::AUTH_CODE_LIFETIME)
    }

    #[must_use]
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self { codes: Arc::new(RwLock::new(HashMap::new())), lifetime }
    }

    /// Issue a code bound to a client, redirect URI, scope and S256 challenge.
    pub async fn issue(
        &self,
        client_id: String,
        redirect_uri: String,
        scope: String,
        code_challenge: String,
    ) -> String {
        let code = generate_token();

        self.codes.write().await.insert(
            code.clone(),
            AuthorizationCode {
                code: code.clone(),
                client_id,
                redirect_uri,
                scope,
                code_challenge,
                code_challenge_method: CodeChallengeMethod::S256,
                expires_at: Instant::now() + self.lifetime,
            },
        );

        code
    }

    /// Remove and return a code (one-time use).
    ///
    /// Expired codes are still returned and removed; callers check
    /// [`AuthorizationCode::is_expired`].
    pub async fn redeem(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.write().await.remove(code)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.codes.read().await.len()
    }
}

impl Default for AuthorizationCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthorizationCodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeStore").field("lifetime", &self.lifetime).finish()
    }
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// Issued bearer tokens.
#[derive(Clone)]
pub struct TokenStore {
    tokens: Arc<RwLock<HashMap<String, Token>>>,
    lifetime: Duration,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_lifetime(defaults::ACCESS_TOKEN_LIFETIME)
    }

    #[must_use]
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self { tokens: Arc::new(RwLock::new(HashMap::new())), lifetime }
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a bearer token for a client.
    pub async fn issue(&self, client_id: &str, scope: &str) -> Token {
        let token = Token {
            access_token: generate_token(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            expires_at: Instant::now() + self.lifetime,
        };

        self.tokens.write().await.insert(token.access_token.clone(), token.clone());

        token
    }

    /// Return the token if present and unexpired. An expired token is evicted.
    pub async fn validate(&self, access_token: &str) -> Option<Token> {
        {
            let tokens = self.tokens.read().await;
            match tokens.get(access_token) {
                None => return None,
                Some(token) if !token.is_expired() => return Some(token.clone()),
                Some(_) => {}
            }
        }

        let mut tokens = self.tokens.write().await;
        // Re-check under the write lock.
        if tokens.get(access_token).is_some_and(Token::is_expired) {
            if let Some(expired) = tokens.remove(access_token) {
                tracing::debug!(client_id = %expired.client_id, "Evicted expired access token");
            }
        }
        None
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").field("lifetime", &self.lifetime).finish()
    }
}
