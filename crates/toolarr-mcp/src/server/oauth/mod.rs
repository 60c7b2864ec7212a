//! OAuth 2.0 authorization server for MCP authentication.
//!
//! A self-contained authorization server embedded in the gateway. State lives
//! in process memory and is lost on restart.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code and Client Credentials grants

pub mod authorization;
pub mod handlers;
pub mod pkce;
pub mod store;
pub mod types;

pub use authorization::AuthorizationServer;
pub use store::{AuthorizationCodeStore, ClientStore, TokenStore};
