//! JSON-RPC 2.0 dispatch for the MCP endpoint.
//!
//! Methods are looked up in a name-keyed table. Tool failures are reported as
//! successful responses with `isError: true`; only protocol problems become
//! JSON-RPC errors.

use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::server::auth::AuthContext;
use crate::tools::ToolRegistry;

/// Protocol version answered when the client does not propose one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "toolarr-mcp";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A validated JSON-RPC 2.0 request.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    pub method: String,
    pub params: Value,
    /// `None` marks a notification.
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Validate the envelope shape. On failure, returns the id to echo.
    fn from_envelope(envelope: Value) -> Result<Self, Value> {
        let Value::Object(mut envelope) = envelope else {
            return Err(Value::Null);
        };

        let id = envelope.remove("id");
        let echo = id.clone().filter(is_valid_id).unwrap_or(Value::Null);

        if !id.as_ref().is_none_or(is_valid_id) {
            return Err(Value::Null);
        }
        if envelope.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(echo);
        }
        let Some(Value::String(method)) = envelope.remove("method") else {
            return Err(echo);
        };
        let params = match envelope.remove("params") {
            None => Value::Null,
            Some(params @ (Value::Object(_) | Value::Array(_) | Value::Null)) => params,
            Some(_) => return Err(echo),
        };

        Ok(Self { method, params, id })
    }

    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn is_valid_id(id: &Value) -> bool {
    matches!(id, Value::String(_) | Value::Number(_) | Value::Null)
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: "Internal error".into(),
            data: Some(Value::String(detail.into())),
        }
    }
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: None, error: Some(error), id }
    }

    #[must_use]
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self::failure(id, JsonRpcError::new(code, message))
    }
}

type MethodResult = Result<Value, JsonRpcError>;
type MethodFn = for<'a> fn(&'a RpcDispatcher, Value, &'a AuthContext) -> BoxFuture<'a, MethodResult>;

/// Routes JSON-RPC requests to MCP methods.
pub struct RpcDispatcher {
    registry: Arc<ToolRegistry>,
    methods: HashMap<&'static str, MethodFn>,
}

impl RpcDispatcher {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        let mut methods: HashMap<&'static str, MethodFn> = HashMap::new();
        methods.insert("initialize", initialize);
        methods.insert("notifications/initialized", acknowledge);
        methods.insert("ping", acknowledge);
        methods.insert("tools/list", tools_list);
        methods.insert("tools/call", tools_call);
        methods.insert("resources/list", resources_list);
        methods.insert("prompts/list", prompts_list);

        Self { registry, methods }
    }

    /// Handle one raw request body. Returns `None` for notifications.
    pub async fn dispatch(&self, body: &[u8], auth: &AuthContext) -> Option<JsonRpcResponse> {
        let envelope: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable JSON-RPC body");
                return Some(JsonRpcResponse::error(Value::Null, PARSE_ERROR, "Parse error"));
            }
        };

        let request = match JsonRpcRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(id) => return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid Request")),
        };

        self.handle(request, auth).await
    }

    /// Dispatch an already validated request.
    pub async fn handle(&self, request: JsonRpcRequest, auth: &AuthContext) -> Option<JsonRpcResponse> {
        tracing::debug!(method = %request.method, notification = request.is_notification(), "Dispatching JSON-RPC request");
        let JsonRpcRequest { method, params, id } = request;

        let outcome = match self.methods.get(method.as_str()) {
            Some(handler) => AssertUnwindSafe(handler(self, params, auth))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let detail = panic_message(panic.as_ref());
                    tracing::error!(method = %method, error = %detail, "JSON-RPC method panicked");
                    Err(JsonRpcError::internal(detail))
                }),
            None => Err(JsonRpcError::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))),
        };

        let id = id?;
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }
}

impl std::fmt::Debug for RpcDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcDispatcher")
            .field("tools", &self.registry.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

// ─── Methods ─────────────────────────────────────────────────────────────────

fn initialize<'a>(_: &'a RpcDispatcher, params: Value, _: &'a AuthContext) -> BoxFuture<'a, MethodResult> {
    async move {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        tracing::info!(protocol_version = %protocol_version, "MCP initialize");

        Ok(json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": true },
                "resources": {},
                "prompts": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }
    .boxed()
}

fn acknowledge<'a>(_: &'a RpcDispatcher, _: Value, _: &'a AuthContext) -> BoxFuture<'a, MethodResult> {
    async { Ok(json!({})) }.boxed()
}

fn resources_list<'a>(_: &'a RpcDispatcher, _: Value, _: &'a AuthContext) -> BoxFuture<'a, MethodResult> {
    async { Ok(json!({ "resources": [] })) }.boxed()
}

fn prompts_list<'a>(_: &'a RpcDispatcher, _: Value, _: &'a AuthContext) -> BoxFuture<'a, MethodResult> {
    async { Ok(json!({ "prompts": [] })) }.boxed()
}

fn tools_list<'a>(dispatcher: &'a RpcDispatcher, _: Value, _: &'a AuthContext) -> BoxFuture<'a, MethodResult> {
    async move {
        let tools = serde_json::to_value(dispatcher.registry.list())
            .map_err(|e| JsonRpcError::internal(e.to_string()))?;
        Ok(json!({ "tools": tools }))
    }
    .boxed()
}

fn tools_call<'a>(
    dispatcher: &'a RpcDispatcher,
    params: Value,
    auth: &'a AuthContext,
) -> BoxFuture<'a, MethodResult> {
    async move {
        let Value::Object(mut params) = params else {
            return Err(JsonRpcError::invalid_params("params must be an object"));
        };
        let Some(Value::String(name)) = params.remove("name") else {
            return Err(JsonRpcError::invalid_params("Missing 'name' parameter"));
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(JsonRpcError::invalid_params("'arguments' must be an object")),
        };

        let Some(handler) = dispatcher.registry.get(&name) else {
            return Err(JsonRpcError::invalid_params(format!("Tool '{name}' not found")));
        };

        tracing::info!(tool = %name, principal = %auth.principal, "Executing tool");

        Ok(match handler.call(arguments, auth).await {
            Ok(value) => tool_content(render_text(value), false),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Tool execution failed");
                tool_content(e.to_user_message(), true)
            }
        })
    }
    .boxed()
}

/// Wrap text in the MCP tool result envelope.
fn tool_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}

/// Strings pass through; anything else is pretty-printed JSON.
fn render_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}
