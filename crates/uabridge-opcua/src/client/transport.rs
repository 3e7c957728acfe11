// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! [`OpcUaTransport`] is the seam between the bridge's logic and the wire.
//! The `real-transport` feature provides an implementation backed by the
//! `opcua` crate; tests drive the same logic through in-memory transports.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{is_good_status, OpcUaResult};
use crate::types::{NodeId, OpcUaConfig, OpcUaDataType, QualifiedName};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Transport is not connected.
    #[default]
    Disconnected,

    /// Transport is establishing connection.
    Connecting,

    /// Transport is connected and ready.
    Connected,

    /// The last connection attempt failed.
    Failed,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ReadResult
// =============================================================================

/// Result of reading one attribute of one node.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The node ID that was read.
    pub node_id: NodeId,

    /// The value read (if successful).
    pub value: Option<OpcUaValue>,

    /// Status code of the read operation.
    pub status_code: u32,
}

impl ReadResult {
    /// Creates a successful read result.
    pub fn success(node_id: NodeId, value: OpcUaValue) -> Self {
        Self {
            node_id,
            value: Some(value),
            status_code: 0,
        }
    }

    /// Creates a failed read result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            value: None,
            status_code,
        }
    }

    /// Returns `true` if the status has Good severity.
    #[inline]
    pub fn is_good(&self) -> bool {
        is_good_status(self.status_code)
    }
}

// =============================================================================
// WriteResult
// =============================================================================

/// Result of a node write operation.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// The node ID that was written.
    pub node_id: NodeId,

    /// Status code of the write operation.
    pub status_code: u32,
}

impl WriteResult {
    /// Creates a successful write result.
    pub fn success(node_id: NodeId) -> Self {
        Self {
            node_id,
            status_code: 0,
        }
    }

    /// Creates a failed write result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the status has Good severity.
    #[inline]
    pub fn is_good(&self) -> bool {
        is_good_status(self.status_code)
    }
}

// =============================================================================
// CallResult
// =============================================================================

/// Result of a method call.
#[derive(Debug, Clone, Default)]
pub struct CallResult {
    /// Overall status of the call.
    pub status_code: u32,

    /// Per-argument status codes, when the server reports them.
    pub input_argument_results: Vec<u32>,

    /// Output arguments in declaration order.
    pub output_arguments: Vec<OpcUaValue>,
}

impl CallResult {
    /// Creates a successful call result.
    pub fn success(output_arguments: Vec<OpcUaValue>) -> Self {
        Self {
            status_code: 0,
            input_argument_results: Vec::new(),
            output_arguments,
        }
    }

    /// Creates a failed call result.
    pub fn failure(status_code: u32) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    /// Returns `true` if the status has Good severity.
    #[inline]
    pub fn is_good(&self) -> bool {
        is_good_status(self.status_code)
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// A decoded OPC UA variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(chrono::DateTime<chrono::Utc>),
    /// GUID value.
    Guid(uuid::Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node identifier, e.g. the DataType attribute.
    NodeId(NodeId),
    /// Text part of a localized text.
    LocalizedText(String),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Array of values.
    Array(Vec<OpcUaValue>),
    /// Null value.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Returns the data type of this value.
    pub fn data_type(&self) -> OpcUaDataType {
        match self {
            Self::Boolean(_) => OpcUaDataType::Boolean,
            Self::SByte(_) => OpcUaDataType::SByte,
            Self::Byte(_) => OpcUaDataType::Byte,
            Self::Int16(_) => OpcUaDataType::Int16,
            Self::UInt16(_) => OpcUaDataType::UInt16,
            Self::Int32(_) => OpcUaDataType::Int32,
            Self::UInt32(_) => OpcUaDataType::UInt32,
            Self::Int64(_) => OpcUaDataType::Int64,
            Self::UInt64(_) => OpcUaDataType::UInt64,
            Self::Float(_) => OpcUaDataType::Float,
            Self::Double(_) => OpcUaDataType::Double,
            Self::String(_) => OpcUaDataType::String,
            Self::DateTime(_) => OpcUaDataType::DateTime,
            Self::Guid(_) => OpcUaDataType::Guid,
            Self::ByteString(_) => OpcUaDataType::ByteString,
            Self::NodeId(_) => OpcUaDataType::NodeId,
            Self::LocalizedText(_) => OpcUaDataType::LocalizedText,
            Self::QualifiedName(_) => OpcUaDataType::QualifiedName,
            Self::Array(_) | Self::Null => OpcUaDataType::Variant,
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::UInt64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::LocalizedText(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the value as a node id.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to a JSON value for structured tool output.
    ///
    /// Non-finite floats have no JSON number form and are emitted as text.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Boolean(v) => JsonValue::Bool(*v),
            Self::SByte(_)
            | Self::Byte(_)
            | Self::Int16(_)
            | Self::UInt16(_)
            | Self::Int32(_)
            | Self::UInt32(_)
            | Self::Int64(_) => self.as_i64().map(JsonValue::from).unwrap_or(JsonValue::Null),
            Self::UInt64(v) => JsonValue::from(*v),
            Self::Float(v) => float_json(*v as f64),
            Self::Double(v) => float_json(*v),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => JsonValue::Null,
            other => JsonValue::String(other.to_string()),
        }
    }
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) | Self::LocalizedText(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::QualifiedName(v) => write!(f, "{}", v),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// BrowseResult
// =============================================================================

/// One forward hierarchical reference returned by a browse.
#[derive(Debug, Clone)]
pub struct BrowseResult {
    /// Target node of the reference.
    pub node_id: NodeId,

    /// Browse name of the target.
    pub browse_name: QualifiedName,

    /// Node class bit value, 0 when the server did not report it.
    pub node_class: u32,
}

impl BrowseResult {
    /// Creates a browse result.
    pub fn new(node_id: NodeId, browse_name: QualifiedName, node_class: u32) -> Self {
        Self {
            node_id,
            browse_name,
            node_class,
        }
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Abstract transport trait for OPC UA communication.
///
/// Service calls return `Err` when the request itself fails. Per-node
/// outcomes travel as status codes inside the results, one result per
/// requested node in request order.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a transport can be shared
/// behind the connection manager's lock.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Establishes the transport and creates and activates a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&mut self) -> OpcUaResult<()>;

    /// Closes the session, then the transport.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` if the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Reads the Value attribute of a single node.
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult>;

    /// Reads the Value attribute of several nodes in one request.
    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>>;

    /// Reads a specific attribute of a node.
    async fn read_attribute(&self, node_id: &NodeId, attribute_id: u32)
        -> OpcUaResult<ReadResult>;

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Writes the Value attribute of a single node.
    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult>;

    /// Writes several node values in one request.
    async fn write_values(&self, writes: &[(NodeId, OpcUaValue)])
        -> OpcUaResult<Vec<WriteResult>>;

    // =========================================================================
    // Browse Operations
    // =========================================================================

    /// Browses forward hierarchical references of a node.
    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseResult>>;

    // =========================================================================
    // Method Operations
    // =========================================================================

    /// Invokes a method on an object.
    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: &[OpcUaValue],
    ) -> OpcUaResult<CallResult>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the transport display name for logging.
    fn display_name(&self) -> String;

    /// Returns the server endpoint URL.
    fn endpoint(&self) -> &str;

    /// Returns the configuration.
    fn config(&self) -> &OpcUaConfig;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Failed.is_connected());
        assert_eq!(TransportState::default().to_string(), "disconnected");
    }

    #[test]
    fn test_read_result_status() {
        let success = ReadResult::success(NodeId::numeric(2, 1001), OpcUaValue::Double(25.5));
        assert!(success.is_good());

        let failure = ReadResult::failure(NodeId::numeric(2, 1001), 0x8034_0000);
        assert!(!failure.is_good());
        assert!(failure.value.is_none());

        let uncertain = ReadResult::failure(NodeId::numeric(2, 1001), 0x4000_0000);
        assert!(!uncertain.is_good());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(OpcUaValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(OpcUaValue::Int32(1).as_bool(), None);
        assert_eq!(OpcUaValue::Int32(42).as_i64(), Some(42));
        assert_eq!(OpcUaValue::Int32(42).as_f64(), Some(42.0));
        assert_eq!(OpcUaValue::Double(1.5).as_i64(), None);
        assert_eq!(OpcUaValue::LocalizedText("Pump".into()).as_str(), Some("Pump"));
        assert!(OpcUaValue::default().is_null());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(OpcUaValue::Double(25.5).to_string(), "25.5");
        assert_eq!(OpcUaValue::Boolean(false).to_string(), "false");
        assert_eq!(
            OpcUaValue::Array(vec![OpcUaValue::Int32(1), OpcUaValue::Int32(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(OpcUaValue::NodeId(NodeId::numeric(0, 11)).to_string(), "i=11");
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(OpcUaValue::Int16(-3).to_json(), serde_json::json!(-3));
        assert_eq!(OpcUaValue::Double(2.5).to_json(), serde_json::json!(2.5));
        assert_eq!(OpcUaValue::Double(f64::NAN).to_json(), serde_json::json!("NaN"));
        assert_eq!(OpcUaValue::String("on".into()).to_json(), serde_json::json!("on"));
        assert_eq!(OpcUaValue::Null.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_call_result() {
        assert!(CallResult::success(vec![OpcUaValue::Int32(3)]).is_good());
        assert!(!CallResult::failure(0x8075_0000).is_good());
    }
}
