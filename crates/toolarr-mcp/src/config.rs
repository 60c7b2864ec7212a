//! Configuration for the Toolarr MCP gateway.

use std::time::Duration;

use anyhow::Context;

/// OAuth and transport constants.
pub mod defaults {
    use std::time::Duration;

    /// Public base URL used in metadata documents when none is configured.
    pub const BASE_URL: &str = "http://localhost:8000";

    /// Scope recorded on codes and tokens when the caller asks for none.
    pub const SCOPE: &str = "mcp";

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(600);

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

    /// Interval between SSE heartbeat events.
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

    /// Redirect targets accepted by the authorize endpoint.
    pub const REDIRECT_URIS: &[&str] = &[
        "https://claude.ai/api/mcp/auth_callback",
        "https://claude.com/api/mcp/auth_callback",
        "http://localhost:6274/oauth/callback",
        "http://localhost:6274/oauth/callback/debug",
    ];
}

/// Gateway configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Static pre-shared bearer key. `None` disables the static-bearer path.
    pub api_key: Option<String>,

    /// Client id of the pre-provisioned (non-dynamic) client.
    pub static_client_id: Option<String>,

    /// Secret of the pre-provisioned client.
    pub static_client_secret: Option<String>,

    /// Public base URL for metadata and `WWW-Authenticate` announcements.
    pub base_url: String,

    /// Exact redirect URIs the authorize endpoint will send codes to.
    pub allowed_redirect_uris: Vec<String>,

    /// Scope used when a request names none.
    pub default_scope: String,

    /// SSE heartbeat interval.
    pub heartbeat_interval: Duration,
}

impl Config {
    /// Create a configuration with the given credentials and default settings.
    #[must_use]
    pub fn new(
        api_key: Option<String>,
        static_client_id: Option<String>,
        static_client_secret: Option<String>,
    ) -> Self {
        Self {
            api_key,
            static_client_id,
            static_client_secret,
            base_url: defaults::BASE_URL.to_string(),
            allowed_redirect_uris: defaults::REDIRECT_URIS
                .iter()
                .map(|uri| (*uri).to_string())
                .collect(),
            default_scope: defaults::SCOPE.to_string(),
            heartbeat_interval: defaults::HEARTBEAT_INTERVAL,
        }
    }

    /// Deterministic configuration for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        let mut config = Self::new(
            Some("test-api-key".to_string()),
            Some("static-client".to_string()),
            Some("static-secret".to_string()),
        );
        config.base_url = "https://gateway.example.com".to_string();
        config.allowed_redirect_uris.push("https://client.example.com/cb".to_string());
        config.heartbeat_interval = Duration::from_millis(50);
        config
    }

    /// Create configuration from environment variables (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns error if `MCP_HEARTBEAT_SECS` is not a positive integer.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::new(
            non_empty_var("TOOL_API_KEY"),
            non_empty_var("MCP_CLIENT_ID"),
            non_empty_var("MCP_CLIENT_SECRET"),
        );

        if let Some(base_url) = non_empty_var("BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(uris) = non_empty_var("MCP_ALLOWED_REDIRECT_URIS") {
            config.allowed_redirect_uris = parse_list(&uris);
        }
        if let Some(secs) = non_empty_var("MCP_HEARTBEAT_SECS") {
            config.heartbeat_interval = parse_heartbeat(&secs)?;
        }

        Ok(config)
    }

    /// The static client pair, when both halves are configured.
    #[must_use]
    pub fn static_client(&self) -> Option<(&str, &str)> {
        match (&self.static_client_id, &self.static_client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Whether `redirect_uri` is on the allow-list (exact match).
    #[must_use]
    pub fn is_allowed_redirect(&self, redirect_uri: &str) -> bool {
        self.allowed_redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_heartbeat(raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw.trim().parse().context("MCP_HEARTBEAT_SECS must be an integer")?;
    anyhow::ensure!(secs > 0, "MCP_HEARTBEAT_SECS must be positive");
    Ok(Duration::from_secs(secs))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}
