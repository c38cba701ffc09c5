//! JSON-RPC 2.0 types and MCP method dispatch.
//!
//! Shared by the stdio transport and `POST /mcp`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::tools::{McpTool, ToolContext};

/// Protocol version answered when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Standard and server-defined error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const TOOL_ERROR: i32 = -32000;
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
            id,
        }
    }

    #[must_use]
    fn with_data(mut self, data: serde_json::Value) -> Self {
        if let Some(error) = &mut self.error {
            error.data = Some(data);
        }
        self
    }
}

/// MCP tool info for tools/list response.
#[derive(Debug, Serialize)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Handle one request. Returns `None` for notifications, which get no reply.
pub async fn dispatch(
    req: JsonRpcRequest,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> Option<JsonRpcResponse> {
    let Some(id) = req.id else {
        tracing::debug!(method = %req.method, "Notification");
        return None;
    };
    let id = Some(id);

    if req.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::error(id, codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""));
    }

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, handle_initialize(&req.params)),
        "tools/list" => handle_tools_list(id, tools),
        "tools/call" => handle_tools_call(id, &req.params, tools, ctx).await,
        "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
        _ => JsonRpcResponse::error(id, codes::METHOD_NOT_FOUND, format!("Method not found: {}", req.method)),
    };
    Some(response)
}

/// Parse one raw message and dispatch it.
pub async fn dispatch_str(raw: &str, tools: &[Box<dyn McpTool>], ctx: &ToolContext) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcRequest>(raw) {
        Ok(req) => dispatch(req, tools, ctx).await,
        Err(e) => Some(JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {}", e))),
    }
}

fn handle_initialize(params: &serde_json::Value) -> serde_json::Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    tracing::info!("MCP initialize: protocol version {}", protocol_version);

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": "project-search-bar",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list(id: Option<serde_json::Value>, tools: &[Box<dyn McpTool>]) -> JsonRpcResponse {
    let tool_list: Vec<McpToolInfo> = tools
        .iter()
        .map(|t| McpToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect();

    JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_list }))
}

async fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing 'name' parameter");
    };

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

    let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, format!("Tool not found: {}", tool_name));
    };

    tracing::info!(tool = %tool_name, "Executing tool");

    match tool.execute(ctx, arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result
                }]
            }),
        ),
        Err(e) => {
            tracing::warn!(tool = %tool_name, error = %e, "Tool execution failed");
            JsonRpcResponse::error(id, codes::TOOL_ERROR, e.to_user_message())
                .with_data(serde_json::json!({ "status": e.status_code() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::search::SearchEngine;
    use crate::store::Store;
    use crate::tools::register_all_tools;

    fn ctx() -> ToolContext {
        let engine = Arc::new(SearchEngine::open(Store::open_in_memory().unwrap()).unwrap());
        ToolContext::new(engine, None, None)
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let tools = register_all_tools();
        let reply = dispatch_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, &tools, &ctx()).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let tools = register_all_tools();
        let reply = dispatch_str("{not json", &tools, &ctx()).await.unwrap();
        assert_eq!(reply.error.unwrap().code, codes::PARSE_ERROR);
        assert!(reply.id.is_none());
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let tools = register_all_tools();
        let raw = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#;
        let reply = dispatch_str(raw, &tools, &ctx()).await.unwrap();
        let result = reply.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "project-search-bar");
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let tools = register_all_tools();
        let reply = dispatch_str(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#, &tools, &ctx())
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, codes::METHOD_NOT_FOUND);

        let raw = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope"}}"#;
        let reply = dispatch_str(raw, &tools, &ctx()).await.unwrap();
        assert_eq!(reply.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_error_carries_status() {
        let tools = register_all_tools();
        let raw = r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"get_paper","arguments":{"arxivId":"2101.99999"}}}"#;
        let reply = dispatch_str(raw, &tools, &ctx()).await.unwrap();
        let error = reply.error.unwrap();
        assert_eq!(error.code, codes::TOOL_ERROR);
        assert_eq!(error.data.unwrap()["status"], 404);
        assert_eq!(reply.id, Some(serde_json::json!("a")));
    }
}
