// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tool catalogue and dispatch.
//!
//! Each [`Tool`] maps one-to-one onto an [`OpcUaBridge`] operation. The
//! catalogue is what `tools/list` returns; [`call_tool`] decodes the
//! arguments and runs the operation.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uabridge_opcua::bridge::{
    BrowseChildrenRequest, CallMethodRequest, GetAllVariablesRequest, ReadMultipleRequest,
    ReadNodeRequest, WriteMultipleRequest, WriteNodeRequest,
};
use uabridge_opcua::{OpcUaBridge, OpcUaTransport, ToolOutput};

use super::protocol::JsonRpcError;

// =============================================================================
// Tool
// =============================================================================

/// The tools offered by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `read_opcua_node`
    ReadNode,
    /// `write_opcua_node`
    WriteNode,
    /// `browse_opcua_node_children`
    BrowseChildren,
    /// `read_multiple_opcua_nodes`
    ReadMultiple,
    /// `write_multiple_opcua_nodes`
    WriteMultiple,
    /// `call_opcua_method`
    CallMethod,
    /// `get_all_variables`
    GetAllVariables,
}

impl Tool {
    /// Every tool, in catalogue order.
    pub const ALL: [Tool; 7] = [
        Tool::ReadNode,
        Tool::WriteNode,
        Tool::BrowseChildren,
        Tool::CallMethod,
        Tool::ReadMultiple,
        Tool::WriteMultiple,
        Tool::GetAllVariables,
    ];

    /// Wire name of the tool.
    pub const fn name(self) -> &'static str {
        match self {
            Tool::ReadNode => "read_opcua_node",
            Tool::WriteNode => "write_opcua_node",
            Tool::BrowseChildren => "browse_opcua_node_children",
            Tool::ReadMultiple => "read_multiple_opcua_nodes",
            Tool::WriteMultiple => "write_multiple_opcua_nodes",
            Tool::CallMethod => "call_opcua_method",
            Tool::GetAllVariables => "get_all_variables",
        }
    }

    /// Looks up a tool by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Description shown to the caller.
    pub const fn description(self) -> &'static str {
        match self {
            Tool::ReadNode => {
                "Read the value of a specific OPC UA node. node_id uses the form \
                 'ns=<namespace>;i=<identifier>', for example 'ns=2;i=2'."
            }
            Tool::WriteNode => {
                "Write a value to a specific OPC UA node. The value is converted to the \
                 type of the node's current value."
            }
            Tool::BrowseChildren => {
                "Browse the children of a specific OPC UA node, for example 'ns=0;i=85' \
                 for the Objects folder. Lists each child's NodeId and BrowseName."
            }
            Tool::ReadMultiple => {
                "Read the values of multiple OPC UA nodes in a single request."
            }
            Tool::WriteMultiple => {
                "Write values to multiple OPC UA nodes in a single request. Each entry \
                 holds 'node_id' and 'value'; a status is reported per entry."
            }
            Tool::CallMethod => {
                "Call a method on an OPC UA object node. Numeric arguments are sent as \
                 numbers, everything else as strings."
            }
            Tool::GetAllVariables => {
                "Get all variables of the OPC UA server, excluding those under the \
                 built-in 'Server' object, with name, node id, parent object, value, \
                 data type and description."
            }
        }
    }

    /// JSON Schema of the tool arguments.
    pub fn input_schema(self) -> Value {
        let scalar = json!({"type": ["string", "number", "boolean"]});
        match self {
            Tool::ReadNode | Tool::BrowseChildren => json!({
                "type": "object",
                "properties": {
                    "node_id": {"type": "string", "description": "OPC UA node id"}
                },
                "required": ["node_id"]
            }),
            Tool::WriteNode => json!({
                "type": "object",
                "properties": {
                    "node_id": {"type": "string", "description": "OPC UA node id"},
                    "value": scalar
                },
                "required": ["node_id", "value"]
            }),
            Tool::ReadMultiple => json!({
                "type": "object",
                "properties": {
                    "node_ids": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["node_ids"]
            }),
            Tool::WriteMultiple => json!({
                "type": "object",
                "properties": {
                    "nodes_to_write": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "node_id": {"type": "string"},
                                "value": scalar
                            },
                            "required": ["node_id", "value"]
                        }
                    }
                },
                "required": ["nodes_to_write"]
            }),
            Tool::CallMethod => json!({
                "type": "object",
                "properties": {
                    "object_node_id": {"type": "string"},
                    "method_node_id": {"type": "string"},
                    "arguments": {"type": "array", "items": scalar}
                },
                "required": ["object_node_id", "method_node_id"]
            }),
            Tool::GetAllVariables => json!({"type": "object", "properties": {}}),
        }
    }

    /// Catalogue entry as returned by `tools/list`.
    pub fn definition(self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

/// The full catalogue.
pub fn tool_definitions() -> Vec<Value> {
    Tool::ALL.into_iter().map(Tool::definition).collect()
}

// =============================================================================
// Dispatch
// =============================================================================

/// Runs a tool. Only argument decoding can fail; operation failures are
/// carried inside the returned [`ToolOutput`].
pub async fn call_tool<T: OpcUaTransport>(
    bridge: &OpcUaBridge<T>,
    tool: Tool,
    arguments: Value,
) -> Result<ToolOutput, JsonRpcError> {
    let output = match tool {
        Tool::ReadNode => bridge.read_node(decode::<ReadNodeRequest>(tool, arguments)?).await,
        Tool::WriteNode => bridge.write_node(decode::<WriteNodeRequest>(tool, arguments)?).await,
        Tool::BrowseChildren => {
            bridge
                .browse_children(decode::<BrowseChildrenRequest>(tool, arguments)?)
                .await
        }
        Tool::ReadMultiple => {
            bridge
                .read_multiple(decode::<ReadMultipleRequest>(tool, arguments)?)
                .await
        }
        Tool::WriteMultiple => {
            bridge
                .write_multiple(decode::<WriteMultipleRequest>(tool, arguments)?)
                .await
        }
        Tool::CallMethod => {
            bridge
                .call_method(decode::<CallMethodRequest>(tool, arguments)?)
                .await
        }
        Tool::GetAllVariables => {
            bridge
                .get_all_variables(decode::<GetAllVariablesRequest>(tool, arguments)?)
                .await
        }
    };
    Ok(output)
}

fn decode<R: DeserializeOwned>(tool: Tool, arguments: Value) -> Result<R, JsonRpcError> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| {
        JsonRpcError::invalid_params(format!("invalid arguments for {}: {}", tool.name(), e))
    })
}
