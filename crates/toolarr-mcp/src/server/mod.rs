//! MCP gateway server.
//!
//! Requests pass the authentication gate ([`auth`]) before reaching the
//! JSON-RPC dispatcher ([`rpc`]); OAuth traffic goes straight to the embedded
//! authorization server ([`oauth`]).

pub mod auth;
pub mod oauth;
pub mod rpc;
pub mod transport;

use std::net::SocketAddr;

use axum::Router;

use crate::config::Config;
use crate::tools::ToolRegistry;

/// MCP gateway over HTTP.
pub struct McpServer {
    config: Config,
    registry: ToolRegistry,
}

impl McpServer {
    /// Create a server over a populated tool registry.
    #[must_use]
    pub const fn new(config: Config, registry: ToolRegistry) -> Self {
        Self { config, registry }
    }

    /// Build the router without binding a socket.
    #[must_use]
    pub fn into_router(self) -> Router {
        transport::create_router(self.config, self.registry)
    }

    /// Run the server until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound or the server fails.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            port,
            base_url = %self.config.base_url,
            tools = self.registry.len(),
            static_key = self.config.api_key.is_some(),
            static_client = self.config.static_client().is_some(),
            "Starting MCP gateway"
        );

        let router = self.into_router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("HTTP server listening on http://{}", addr);

        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("base_url", &self.config.base_url)
            .field("tools", &self.registry.len())
            .finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
