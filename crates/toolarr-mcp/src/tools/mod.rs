//! MCP tool contract and registry.
//!
//! A tool is a named operation with a JSON-schema input contract. Its handler
//! receives the call's argument map and the caller's [`AuthContext`], and
//! returns a JSON value or a [`ToolError`]. Handlers that forward to external
//! APIs live outside this crate and are registered at startup.

pub mod builtin;
mod registry;

pub use registry::ToolRegistry;

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ToolResult;
use crate::server::auth::AuthContext;

/// Arguments passed to a tool (`params.arguments` of a `tools/call`).
pub type ToolArguments = Map<String, Value>;

/// Trait for MCP tool handlers.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments on behalf of `auth`.
    async fn call(&self, arguments: ToolArguments, auth: &AuthContext) -> ToolResult<Value>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a tool handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ToolArguments, AuthContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    FnHandler(f)
}

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolArguments, AuthContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn call(&self, arguments: ToolArguments, auth: &AuthContext) -> ToolResult<Value> {
        (self.0)(arguments, auth.clone()).await
    }
}

/// A registered tool.
#[derive(Clone)]
pub struct Tool {
    /// Unique tool name (e.g., "whoami").
    pub name: String,
    /// Tool description for the LLM.
    pub description: String,
    /// JSON Schema for input parameters.
    pub input_schema: Value,
    /// Handler invoked by `tools/call`.
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a tool from its parts.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name).finish()
    }
}
