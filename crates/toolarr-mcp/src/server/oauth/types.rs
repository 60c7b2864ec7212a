//! OAuth 2.0 records held by the in-memory stores.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// A dynamically registered OAuth client.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub created_at: DateTime<Utc>,
    pub scopes: BTreeSet<String>,
}

/// PKCE challenge methods accepted at the authorize endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
}

impl CodeChallengeMethod {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        (raw == "S256").then_some(Self::S256)
    }
}

/// A single-use authorization code.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: String,
    pub code_challenge_method: CodeChallengeMethod,
    pub expires_at: Instant,
}

impl AuthorizationCode {
    /// Check if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// An issued bearer token.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub client_id: String,
    pub scope: String,
    pub expires_at: Instant,
}

impl Token {
    /// Check if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Whole seconds left before expiry.
    #[cfg(test)]
    pub(crate) fn expires_in(&self) -> u64 {
        self.expires_at.saturating_duration_since(Instant::now()).as_secs()
    }
}
