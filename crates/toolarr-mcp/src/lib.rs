//! Toolarr MCP Gateway
//!
//! An agent-facing Model Context Protocol (MCP) gateway. Exposes a registry of
//! tools over JSON-RPC 2.0 and protects it with an embedded OAuth 2.0
//! authorization server.
//!
//! # Features
//!
//! - **Four credential paths**: static bearer key, issued bearer tokens, static
//!   client Basic auth, and dynamically registered client Basic auth
//! - **OAuth 2.0**: dynamic client registration, authorization code with S256
//!   PKCE, and client credentials grants
//! - **Tool contract**: handlers receive arguments plus the caller's
//!   [`AuthContext`](server::auth::AuthContext); failures are reported in-band
//!
//! # Example
//!
//! ```no_run
//! use toolarr_mcp::{config::Config, server::McpServer, tools::{ToolRegistry, builtin}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut registry = ToolRegistry::new();
//!     builtin::register_builtin_tools(&mut registry)?;
//!
//!     McpServer::new(config, registry).run_http(8000).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{OAuthError, ToolError};
