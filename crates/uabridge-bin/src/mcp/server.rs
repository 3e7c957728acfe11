// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request handling for the tool server.
//!
//! ```text
//! line ──► parse ──► JsonRpcRequest ──► dispatch ──┬─► initialize
//!                        │                         ├─► ping
//!                        │ (no id)                 ├─► tools/list
//!                        ▼                         └─► tools/call ──► OpcUaBridge
//!                   notification: no response
//! ```
//!
//! Protocol errors become JSON-RPC error objects. A tool that fails still
//! produces a normal `tools/call` result, flagged with `isError: true`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uabridge_opcua::{OpcUaBridge, OpcUaTransport};

use super::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use super::tools::{call_tool, tool_definitions, Tool};

/// Name announced in `serverInfo`.
pub const SERVER_NAME: &str = "OPCUA-Control";

// =============================================================================
// ServerStats
// =============================================================================

/// Request counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    requests: AtomicU64,
    notifications: AtomicU64,
    tool_calls: AtomicU64,
    tool_errors: AtomicU64,
    protocol_errors: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStatsSnapshot {
    /// Requests that expected a response.
    pub requests: u64,
    /// Notifications received.
    pub notifications: u64,
    /// `tools/call` requests that reached a tool.
    pub tool_calls: u64,
    /// Tool results flagged as errors.
    pub tool_errors: u64,
    /// JSON-RPC error responses sent.
    pub protocol_errors: u64,
}

impl ServerStats {
    /// Takes a snapshot of the counters.
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_errors: self.tool_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// McpServer
// =============================================================================

/// JSON-RPC front end over an [`OpcUaBridge`].
pub struct McpServer<T: OpcUaTransport> {
    bridge: Arc<OpcUaBridge<T>>,
    stats: ServerStats,
}

impl<T: OpcUaTransport> McpServer<T> {
    /// Creates a server for the given bridge.
    pub fn new(bridge: Arc<OpcUaBridge<T>>) -> Self {
        Self {
            bridge,
            stats: ServerStats::default(),
        }
    }

    /// The bridge this server dispatches to.
    pub fn bridge(&self) -> &Arc<OpcUaBridge<T>> {
        &self.bridge
    }

    /// Request counters.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Handles one line of input. Returns the serialized response, or
    /// `None` for notifications and blank lines.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await?,
            Err(e) => self.protocol_error(Value::Null, JsonRpcError::parse_error(e.to_string())),
        };
        encode(&response)
    }

    /// Handles one raw line. Bytes that are not UTF-8 get a parse error.
    pub async fn handle_bytes(&self, line: &[u8]) -> Option<String> {
        match std::str::from_utf8(line) {
            Ok(text) => self.handle_line(text).await,
            Err(e) => encode(&self.protocol_error(
                Value::Null,
                JsonRpcError::parse_error(format!("invalid UTF-8: {e}")),
            )),
        }
    }

    /// Handles one decoded message.
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);

        if message.is_array() {
            return Some(self.protocol_error(
                Value::Null,
                JsonRpcError::invalid_request("batch requests are not supported"),
            ));
        }

        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return Some(self.protocol_error(id, JsonRpcError::invalid_request(e.to_string())))
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(self.protocol_error(
                id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            ));
        }

        self.handle_request(request).await
    }

    /// Dispatches a parsed request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.stats.notifications.fetch_add(1, Ordering::Relaxed);
            debug!(method = %request.method, "Notification received");
            return None;
        };
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        debug!(method = %request.method, id = %id, "Request received");

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.tools_call(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => self.protocol_error(id, error),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client, endpoint = %self.bridge.manager().endpoint(), "Client initialized");

        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": SERVER_NAME, "version": crate::VERSION },
        })
    }

    async fn tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let mut params = params
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires params"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires a tool name"))?
            .to_string();
        let tool = Tool::from_name(&name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", name)))?;
        let arguments = params
            .get_mut("arguments")
            .map(Value::take)
            .unwrap_or(Value::Null);

        let output = call_tool(&self.bridge, tool, arguments).await?;

        self.stats.tool_calls.fetch_add(1, Ordering::Relaxed);
        if output.is_error {
            self.stats.tool_errors.fetch_add(1, Ordering::Relaxed);
            info!(tool = %name, "Tool reported an error");
        } else {
            debug!(tool = %name, "Tool completed");
        }

        Ok(json!({
            "content": [{ "type": "text", "text": output.text }],
            "isError": output.is_error,
        }))
    }

    fn protocol_error(&self, id: Value, error: JsonRpcError) -> JsonRpcResponse {
        self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
        debug!(code = error.code, message = %error.message, "Protocol error");
        JsonRpcResponse::failure(id, error)
    }
}

fn encode(response: &JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Failed to serialize response");
            None
        }
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for McpServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("bridge", &self.bridge)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
