// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The tool surface of the bridge.
//!
//! [`OpcUaBridge`] exposes seven operations, each taking a deserializable
//! request and returning a [`ToolOutput`]. Nothing here returns `Err` or
//! panics on bad input: every failure, including a connection failure, is
//! rendered into the output text with `is_error` set.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::client::{ConnectionManager, OpcUaTransport};
use crate::discovery::{DiscoveryOptions, DiscoveryWalker, VariableRecord};
use crate::executor::{MethodCall, OperationExecutor, WriteRequest};

// =============================================================================
// ToolOutput
// =============================================================================

/// Text result of one tool operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    /// Human-readable result.
    pub text: String,

    /// Whether the operation as a whole failed.
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful result.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// A failed result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request for `read_opcua_node`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadNodeRequest {
    /// Node to read.
    pub node_id: String,
}

/// Request for `write_opcua_node`.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteNodeRequest {
    /// Node to write.
    pub node_id: String,
    /// Value, as text or a JSON scalar.
    #[serde(deserialize_with = "scalar_text")]
    pub value: String,
}

/// Request for `browse_opcua_node_children`.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseChildrenRequest {
    /// Node whose children are listed.
    pub node_id: String,
}

/// Request for `read_multiple_opcua_nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadMultipleRequest {
    /// Nodes to read, in order.
    pub node_ids: Vec<String>,
}

/// One entry of `write_multiple_opcua_nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeWrite {
    /// Node to write.
    pub node_id: String,
    /// Value, as text or a JSON scalar.
    #[serde(deserialize_with = "scalar_text")]
    pub value: String,
}

impl From<NodeWrite> for WriteRequest {
    fn from(entry: NodeWrite) -> Self {
        WriteRequest::new(entry.node_id, entry.value)
    }
}

/// Request for `write_multiple_opcua_nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteMultipleRequest {
    /// Writes, in order.
    pub nodes_to_write: Vec<NodeWrite>,
}

/// Request for `call_opcua_method`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallMethodRequest {
    /// Object owning the method.
    pub object_node_id: String,
    /// Method to call.
    pub method_node_id: String,
    /// Arguments, as text or JSON scalars.
    #[serde(default, deserialize_with = "scalar_texts")]
    pub arguments: Vec<String>,
}

/// Request for `get_all_variables`. Takes no parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetAllVariablesRequest {}

fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    json_scalar_text(value).map_err(de::Error::custom)
}

fn scalar_texts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<JsonValue>>::deserialize(deserializer)?;
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| json_scalar_text(v).map_err(de::Error::custom))
        .collect()
}

/// Textual form of a JSON string, number or boolean.
fn json_scalar_text(value: JsonValue) -> Result<String, String> {
    match value {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Err("expected a string, number or boolean, found null".into()),
        JsonValue::Array(_) => Err("expected a string, number or boolean, found an array".into()),
        JsonValue::Object(_) => Err("expected a string, number or boolean, found an object".into()),
    }
}

// =============================================================================
// OpcUaBridge
// =============================================================================

/// The seven bridge operations over one managed session.
pub struct OpcUaBridge<T: OpcUaTransport> {
    manager: Arc<ConnectionManager<T>>,
    executor: OperationExecutor<T>,
    walker: DiscoveryWalker<T>,
}

impl<T: OpcUaTransport> OpcUaBridge<T> {
    /// Creates a bridge that owns `transport`. No connection is made until
    /// the first operation.
    pub fn new(transport: T) -> Self {
        Self::with_manager(Arc::new(ConnectionManager::new(transport)), DiscoveryOptions::default())
    }

    /// Creates a bridge over an existing manager.
    pub fn with_manager(manager: Arc<ConnectionManager<T>>, discovery: DiscoveryOptions) -> Self {
        Self {
            executor: OperationExecutor::new(Arc::clone(&manager)),
            walker: DiscoveryWalker::with_options(Arc::clone(&manager), discovery),
            manager,
        }
    }

    /// Returns the connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    /// Returns the operation executor.
    pub fn executor(&self) -> &OperationExecutor<T> {
        &self.executor
    }

    /// Closes the session. Safe to call at any time.
    pub async fn shutdown(&self) {
        self.manager.disconnect().await;
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// `read_opcua_node`.
    pub async fn read_node(&self, request: ReadNodeRequest) -> ToolOutput {
        let node_id = request.node_id;
        match self.executor.read_one(&node_id).await {
            Ok(value) => ToolOutput::ok(format!("Node {} value: {}", node_id, value)),
            Err(e) => ToolOutput::error(format!("Error reading node {}: {}", node_id, e)),
        }
    }

    /// `write_opcua_node`.
    pub async fn write_node(&self, request: WriteNodeRequest) -> ToolOutput {
        let WriteNodeRequest { node_id, value } = request;
        match self.executor.write_one(&node_id, &value).await {
            Ok(()) => ToolOutput::ok(format!("Successfully wrote {} to node {}", value, node_id)),
            Err(e) => ToolOutput::error(format!("Error writing to node {}: {}", node_id, e)),
        }
    }

    /// `browse_opcua_node_children`.
    pub async fn browse_children(&self, request: BrowseChildrenRequest) -> ToolOutput {
        let node_id = request.node_id;
        let children = match self.executor.browse_children(&node_id).await {
            Ok(children) => children,
            Err(e) => {
                return ToolOutput::error(format!(
                    "Error browsing children of node {}: {}",
                    node_id, e
                ))
            }
        };
        match serde_json::to_string(&children) {
            Ok(json) => ToolOutput::ok(format!("Children of {}: {}", node_id, json)),
            Err(e) => ToolOutput::error(format!(
                "Error browsing children of node {}: {}",
                node_id, e
            )),
        }
    }

    /// `read_multiple_opcua_nodes`.
    ///
    /// Results are a list of `{node_id, value | error}` objects in request
    /// order rather than a map keyed by node id. A list keeps one entry per
    /// requested id, so repeated ids and ids that fail to parse still show up.
    pub async fn read_multiple(&self, request: ReadMultipleRequest) -> ToolOutput {
        let entries = self.executor.read_many(request.node_ids.as_slice()).await;
        let results: Vec<JsonValue> = entries
            .into_iter()
            .map(|entry| match entry.outcome {
                Ok(value) => {
                    serde_json::json!({ "node_id": entry.node_id, "value": value.to_json() })
                }
                Err(e) => {
                    serde_json::json!({ "node_id": entry.node_id, "error": format!("Error: {}", e) })
                }
            })
            .collect();
        ToolOutput::ok(format!(
            "Multiple node read results: {}",
            JsonValue::Array(results)
        ))
    }

    /// `write_multiple_opcua_nodes`.
    pub async fn write_multiple(&self, request: WriteMultipleRequest) -> ToolOutput {
        let requests: Vec<WriteRequest> =
            request.nodes_to_write.into_iter().map(WriteRequest::from).collect();
        let entries = self.executor.write_many(&requests).await;
        let results: Vec<JsonValue> = entries
            .into_iter()
            .map(|entry| {
                let status = match entry.outcome {
                    Ok(()) => "Success".to_string(),
                    Err(e) => format!("Error: {}", e),
                };
                serde_json::json!({ "node_id": entry.node_id, "status": status })
            })
            .collect();
        ToolOutput::ok(format!(
            "Write operation results: {}",
            JsonValue::Array(results)
        ))
    }

    /// `call_opcua_method`.
    pub async fn call_method(&self, request: CallMethodRequest) -> ToolOutput {
        let call = MethodCall::new(
            request.object_node_id,
            request.method_node_id,
            request.arguments,
        );
        match self.executor.call_method(&call).await {
            Ok(outputs) => {
                let outputs: Vec<JsonValue> = outputs.iter().map(|v| v.to_json()).collect();
                ToolOutput::ok(format!(
                    "Method call successful. Object: {}, Method: {}, Result: {}",
                    call.object_id,
                    call.method_id,
                    JsonValue::Array(outputs)
                ))
            }
            Err(e) => ToolOutput::error(format!(
                "Error calling method {} on object {}: {}",
                call.method_id, call.object_id, e
            )),
        }
    }

    /// `get_all_variables`.
    pub async fn get_all_variables(&self, _request: GetAllVariablesRequest) -> ToolOutput {
        match self.walker.discover_all().await {
            Ok(records) if records.is_empty() => {
                ToolOutput::ok("No variables found in the OPC UA server.")
            }
            Ok(records) => ToolOutput::ok(render_variables(&records)),
            Err(e) => ToolOutput::error(format!("Error while finding variables: {}", e)),
        }
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for OpcUaBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaBridge")
            .field("endpoint", &self.manager.endpoint())
            .finish()
    }
}

fn render_variables(records: &[VariableRecord]) -> String {
    let mut text = format!("Found {} variables:\n", records.len());
    for record in records {
        let value = record
            .value
            .as_ref()
            .map_or_else(|| "None".to_string(), ToString::to_string);
        let data_type = record
            .data_type
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        // Writing to a String cannot fail.
        let _ = write!(
            text,
            "\n- Name: {}\n  NodeID: {}\n  Object ID: {}\n  Value: {}\n  Data Type: {}\n  Description: {}\n",
            record.name, record.node_id, record.parent, value, data_type, record.description
        );
    }
    text
}

// =============================================================================
// Tests
// =============================================================================
