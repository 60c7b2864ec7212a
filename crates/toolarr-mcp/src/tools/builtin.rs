//! Tools served by the gateway itself.

use serde_json::{Value, json};

use super::{Tool, ToolArguments, ToolHandler, ToolRegistry};
use crate::error::{RegistryError, ToolError, ToolResult};
use crate::server::auth::AuthContext;

/// Reports how the caller authenticated.
pub struct WhoAmITool;

#[async_trait::async_trait]
impl ToolHandler for WhoAmITool {
    async fn call(&self, _arguments: ToolArguments, auth: &AuthContext) -> ToolResult<Value> {
        Ok(serde_json::to_value(auth)?)
    }
}

/// Returns its `message` argument unchanged.
pub struct EchoTool;

#[async_trait::async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, arguments: ToolArguments, _auth: &AuthContext) -> ToolResult<Value> {
        match arguments.get("message") {
            Some(Value::String(message)) => Ok(Value::String(message.clone())),
            Some(_) => Err(ToolError::validation("message", "must be a string")),
            None => Err(ToolError::validation("message", "is required")),
        }
    }
}

/// Register the built-in tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(Tool::new(
        "whoami",
        "Describe how the current caller is authenticated to the gateway.",
        json!({
            "type": "object",
            "properties": {}
        }),
        WhoAmITool,
    ))?;

    registry.register(Tool::new(
        "echo",
        "Echo a message back. Useful for checking connectivity end to end.",
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Text to echo back"}
            },
            "required": ["message"]
        }),
        EchoTool,
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::auth::AuthMethod;

    #[tokio::test]
    async fn test_whoami_reports_context() {
        let auth = AuthContext::new(AuthMethod::DcrBasic, "mcp-abc");
        let value = WhoAmITool.call(ToolArguments::new(), &auth).await.unwrap();
        assert_eq!(value["method"], "dcr-basic");
        assert_eq!(value["principal"], "mcp-abc");
    }

    #[tokio::test]
    async fn test_echo_requires_message() {
        let auth = AuthContext::new(AuthMethod::StaticBearer, "api-key");
        let err = EchoTool.call(ToolArguments::new(), &auth).await.unwrap_err();
        assert!(err.to_user_message().contains("message"));

        let mut args = ToolArguments::new();
        args.insert("message".into(), json!("hello"));
        assert_eq!(EchoTool.call(args, &auth).await.unwrap(), json!("hello"));
    }

    #[test]
    fn test_register_builtin_tools() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["whoami", "echo"]);
    }
}
