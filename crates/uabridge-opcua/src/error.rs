// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA bridge.
//!
//! Every failure the bridge can observe is one of a small set of categories.
//! The tool facade renders them as text, so the `Display` output of each
//! variant is what a caller ultimately reads.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Transport or session establishment
//! ├── Browse        - Reference browsing failures
//! ├── Operation     - Read/write failures and bad statuses
//! ├── Method        - Method invocation failures
//! ├── Conversion    - Text that cannot be coerced to the node's type
//! └── Configuration - Invalid endpoint, node id or settings
//! ```
//!
//! # Examples
//!
//! ```
//! use uabridge_opcua::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused(
//!     "opc.tcp://localhost:4840",
//! ));
//!
//! assert_eq!(error.category(), "connection");
//! assert!(error.is_retryable());
//! ```

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for bridge operations.
#[derive(Debug, Clone, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Node browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Method invocation errors.
    #[error("{0}")]
    Method(#[from] MethodError),

    /// Value coercion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a method error.
    #[inline]
    pub fn method(error: MethodError) -> Self {
        Self::Method(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a connection refused error.
    pub fn connection_refused(endpoint: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::refused(endpoint))
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browse(BrowseError::browse_failed(node_id, message))
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::invalid_node_id(node_id, reason))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Browse(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Method(e) => e.is_retryable(),
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns `true` if this error shows the session itself is gone, as
    /// opposed to one request failing on a live session.
    pub fn is_session_lost(&self) -> bool {
        match self {
            Self::Connection(e) => !matches!(
                e,
                ConnectionError::InvalidEndpoint { .. } | ConnectionError::NoSuitableEndpoint { .. }
            ),
            _ => self.status_code().is_some_and(is_session_status),
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Browse(_) => "browse",
            Self::Operation(OperationError::ReadFailed { .. }) => "read",
            Self::Operation(OperationError::WriteFailed { .. }) => "write",
            Self::Method(_) => "method",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns the OPC UA status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Browse(BrowseError::BadStatus { status_code, .. }) => Some(*status_code),
            Self::Operation(e) => e.status_code(),
            Self::Method(MethodError::CallFailed { status_code, .. }) => *status_code,
            _ => None,
        }
    }

    /// Logs this error under `context`.
    ///
    /// Failures the caller can retry are warnings. Everything else points at
    /// bad input or a broken setup and is logged as an error.
    pub fn log(&self, context: &str) {
        let status = self.status_code().map(describe_status);
        if self.is_retryable() {
            tracing::warn!(
                category = self.category(),
                context,
                status = status.as_deref(),
                "{self}"
            );
        } else {
            tracing::error!(
                category = self.category(),
                context,
                status = status.as_deref(),
                "{self}"
            );
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Transport and session establishment errors.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Connection refused.
    #[error("Connection refused to '{endpoint}'{}", format_reason(.reason))]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Server or stack supplied reason.
        reason: Option<String>,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}' after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint not found: '{endpoint}'{}", format_reason(.reason))]
    EndpointNotFound {
        /// The endpoint URL.
        endpoint: String,
        /// Server or stack supplied reason.
        reason: Option<String>,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// No endpoint matches the requested security settings.
    #[error("No suitable endpoint found with security mode '{security_mode}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed{}", format_reason(.reason))]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

fn format_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: None,
        }
    }

    /// Creates a connection refused error with a reason.
    pub fn refused_with(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: Some(reason.into()),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates an endpoint not found error.
    pub fn endpoint_not_found(endpoint: impl Into<String>, reason: Option<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
            reason,
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. }
            | Self::TimedOut { .. }
            | Self::EndpointNotFound { .. }
            | Self::Closed { .. }
            | Self::NotConnected => true,
            Self::InvalidEndpoint { .. } | Self::NoSuitableEndpoint { .. } => false,
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Reference browsing errors.
#[derive(Debug, Clone, Error)]
pub enum BrowseError {
    /// Browse service call failed.
    #[error("Browse failed for node '{node_id}': {message}")]
    BrowseFailed {
        /// Node ID being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Server returned a bad status for the browse.
    #[error("Browse failed for node '{node_id}': {}", describe_status(*.status_code))]
    BadStatus {
        /// Node ID being browsed.
        node_id: String,
        /// Status code.
        status_code: u32,
    },
}

impl BrowseError {
    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BrowseFailed { .. } => true,
            Self::BadStatus { status_code, .. } => is_transient_status(*status_code),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read/write operation errors.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// Read operation failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
        /// OPC UA status code (if available).
        status_code: Option<u32>,
    },

    /// Write operation failed.
    #[error("Write failed for node '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
        /// OPC UA status code (if available).
        status_code: Option<u32>,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a read failed error from a non-good status.
    pub fn read_bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: describe_status(status_code),
            status_code: Some(status_code),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a write failed error from a non-good status.
    pub fn write_bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: describe_status(status_code),
            status_code: Some(status_code),
        }
    }

    /// Returns the OPC UA status code, if one was reported.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::ReadFailed { status_code, .. } | Self::WriteFailed { status_code, .. } => {
                *status_code
            }
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        // Service-level failures carry no status and are usually transport hiccups.
        self.status_code().map_or(true, is_transient_status)
    }
}

// =============================================================================
// MethodError
// =============================================================================

/// Method invocation errors.
#[derive(Debug, Clone, Error)]
pub enum MethodError {
    /// The call failed or returned a bad status.
    #[error("Call of method '{method_id}' on '{object_id}' failed: {message}")]
    CallFailed {
        /// Object node the method was called on.
        object_id: String,
        /// Method node.
        method_id: String,
        /// Error message.
        message: String,
        /// OPC UA status code (if available).
        status_code: Option<u32>,
    },

    /// An input argument was rejected by the server.
    #[error("Argument {index} of method '{method_id}' rejected: {}", describe_status(*.status_code))]
    InvalidArgument {
        /// Method node.
        method_id: String,
        /// Zero-based argument position.
        index: usize,
        /// Status code for the argument.
        status_code: u32,
    },
}

impl MethodError {
    /// Creates a call failed error.
    pub fn call_failed(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CallFailed {
            object_id: object_id.into(),
            method_id: method_id.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a call failed error from a non-good status.
    pub fn bad_status(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        status_code: u32,
    ) -> Self {
        Self::CallFailed {
            object_id: object_id.into(),
            method_id: method_id.into(),
            message: describe_status(status_code),
            status_code: Some(status_code),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(method_id: impl Into<String>, index: usize, status_code: u32) -> Self {
        Self::InvalidArgument {
            method_id: method_id.into(),
            index,
            status_code,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CallFailed { status_code, .. } => status_code.map_or(true, is_transient_status),
            Self::InvalidArgument { .. } => false,
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Errors converting caller text to a node's value type.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// Text is not a valid value of the target type.
    #[error("Cannot convert '{value}' to {target_type}: {message}")]
    InvalidValue {
        /// Offending text.
        value: String,
        /// Target type name.
        target_type: String,
        /// Why conversion failed.
        message: String,
    },

    /// Numeric value does not fit the target type.
    #[error("Value {value} is out of range for {target_type}")]
    Overflow {
        /// The value as text.
        value: String,
        /// Target type name.
        target_type: String,
    },

    /// Target type cannot be produced from text.
    #[error("Unsupported target type: {type_name}")]
    UnsupportedType {
        /// Type name.
        type_name: String,
    },
}

impl ConversionError {
    /// Creates an invalid value error.
    pub fn invalid_value(
        value: impl Into<String>,
        target_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            value: value.into(),
            target_type: target_type.into(),
            message: message.into(),
        }
    }

    /// Creates an overflow error.
    pub fn overflow(value: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::Overflow {
            value: value.into(),
            target_type: target_type.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration and input validation errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// Invalid endpoint URL.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Invalid node ID text.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The node ID text.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Invalid timeout value.
    #[error("Invalid timeout {duration:?}: {reason}")]
    InvalidTimeout {
        /// The duration.
        duration: Duration,
        /// Reason.
        reason: String,
    },

    /// Missing required field.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid timeout error.
    pub fn invalid_timeout(duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            duration,
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

// =============================================================================
// Status codes
// =============================================================================

/// Returns `true` if the status code has Good severity.
#[inline]
pub const fn is_good_status(code: u32) -> bool {
    code & 0xC000_0000 == 0
}

fn is_transient_status(code: u32) -> bool {
    matches!(
        code & 0xFFFF_0000,
        0x800A_0000 // BadTimeout
            | 0x8005_0000 // BadCommunicationError
            | 0x800D_0000 // BadServerNotConnected
            | 0x8025_0000 // BadSessionIdInvalid
            | 0x8026_0000 // BadSessionClosed
    )
}

fn is_session_status(code: u32) -> bool {
    matches!(
        code & 0xFFFF_0000,
        0x8005_0000 // BadCommunicationError
            | 0x800D_0000 // BadServerNotConnected
            | 0x8022_0000 // BadSecureChannelIdInvalid
            | 0x8025_0000 // BadSessionIdInvalid
            | 0x8026_0000 // BadSessionClosed
            | 0x8027_0000 // BadSessionNotActivated
            | 0x8086_0000 // BadSecureChannelClosed
            | 0x808A_0000 // BadNotConnected
            | 0x80AE_0000 // BadConnectionClosed
    )
}

/// Returns the symbolic name of a common OPC UA status code.
pub fn status_code_name(code: u32) -> &'static str {
    // The low 16 bits carry info flags and do not change the meaning.
    match code & 0xFFFF_0000 {
        0x0000_0000 => "Good",
        0x4000_0000 => "Uncertain",
        0x8000_0000 => "Bad",
        0x8001_0000 => "BadUnexpectedError",
        0x8002_0000 => "BadInternalError",
        0x8003_0000 => "BadOutOfMemory",
        0x8004_0000 => "BadResourceUnavailable",
        0x8005_0000 => "BadCommunicationError",
        0x8006_0000 => "BadEncodingError",
        0x8007_0000 => "BadDecodingError",
        0x800A_0000 => "BadTimeout",
        0x800B_0000 => "BadServiceUnsupported",
        0x800C_0000 => "BadShutdown",
        0x800D_0000 => "BadServerNotConnected",
        0x800E_0000 => "BadServerHalted",
        0x800F_0000 => "BadNothingToDo",
        0x8010_0000 => "BadTooManyOperations",
        0x801F_0000 => "BadUserAccessDenied",
        0x8022_0000 => "BadSecureChannelIdInvalid",
        0x8025_0000 => "BadSessionIdInvalid",
        0x8026_0000 => "BadSessionClosed",
        0x8027_0000 => "BadSessionNotActivated",
        0x8033_0000 => "BadNodeIdInvalid",
        0x8034_0000 => "BadNodeIdUnknown",
        0x8035_0000 => "BadAttributeIdInvalid",
        0x803A_0000 => "BadNotReadable",
        0x803B_0000 => "BadNotWritable",
        0x803C_0000 => "BadOutOfRange",
        0x803D_0000 => "BadNotSupported",
        0x803E_0000 => "BadNotFound",
        0x8040_0000 => "BadNotImplemented",
        0x8074_0000 => "BadTypeMismatch",
        0x8075_0000 => "BadMethodInvalid",
        0x8076_0000 => "BadArgumentsMissing",
        0x8086_0000 => "BadSecureChannelClosed",
        0x808A_0000 => "BadNotConnected",
        0x80AB_0000 => "BadInvalidArgument",
        0x80AE_0000 => "BadConnectionClosed",
        _ => "Unknown",
    }
}

/// Formats a status code as `Name (0xXXXXXXXX)`.
pub fn describe_status(code: u32) -> String {
    format!("{} (0x{:08X})", status_code_name(code), code)
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with OpcUaError.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_retryable() {
        assert!(ConnectionError::refused("opc.tcp://localhost:4840").is_retryable());
        assert!(
            ConnectionError::timed_out("opc.tcp://localhost:4840", Duration::from_secs(5))
                .is_retryable()
        );
        assert!(ConnectionError::NotConnected.is_retryable());
        assert!(!ConnectionError::invalid_endpoint("bad-url", "invalid format").is_retryable());
    }

    #[test]
    fn test_connection_error_display_with_reason() {
        let error = ConnectionError::refused_with("opc.tcp://plc:4840", "BadTimeout");
        assert_eq!(
            error.to_string(),
            "Connection refused to 'opc.tcp://plc:4840': BadTimeout"
        );

        let error = ConnectionError::refused("opc.tcp://plc:4840");
        assert_eq!(error.to_string(), "Connection refused to 'opc.tcp://plc:4840'");
    }

    #[test]
    fn test_status_code_names() {
        assert_eq!(status_code_name(0), "Good");
        assert_eq!(status_code_name(0x8034_0000), "BadNodeIdUnknown");
        assert_eq!(status_code_name(0x803B_0000), "BadNotWritable");
        assert_eq!(status_code_name(0x8074_0000), "BadTypeMismatch");
        // Info bits in the low word are ignored.
        assert_eq!(status_code_name(0x8034_0400), "BadNodeIdUnknown");
        assert_eq!(status_code_name(0x8123_0000), "Unknown");
    }

    #[test]
    fn test_good_status_bits() {
        assert!(is_good_status(0));
        assert!(!is_good_status(0x4000_0000));
        assert!(!is_good_status(0x8034_0000));
        assert!(is_good_status(0x0000_0400));
    }

    #[test]
    fn test_read_bad_status_message() {
        let error = OpcUaError::operation(OperationError::read_bad_status("ns=2;i=9", 0x8034_0000));
        assert_eq!(
            error.to_string(),
            "Read failed for node 'ns=2;i=9': BadNodeIdUnknown (0x80340000)"
        );
        assert_eq!(error.category(), "read");
        assert_eq!(error.status_code(), Some(0x8034_0000));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_write_category() {
        let error = OpcUaError::operation(OperationError::write_failed("ns=2;i=9", "boom"));
        assert_eq!(error.category(), "write");
        assert!(error.is_retryable());
    }

    #[test]
    fn test_method_error() {
        let error =
            OpcUaError::method(MethodError::bad_status("ns=2;i=1", "ns=2;i=2", 0x8075_0000));
        assert_eq!(error.category(), "method");
        assert!(error.to_string().contains("BadMethodInvalid"));
        assert_eq!(error.status_code(), Some(0x8075_0000));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_conversion_error() {
        let error = ConversionError::invalid_value("abc", "Double", "invalid float literal");
        assert!(error.to_string().contains("abc"));
        assert!(error.to_string().contains("Double"));

        let error = OpcUaError::from(error);
        assert_eq!(error.category(), "conversion");
        assert!(!error.is_retryable());
        assert_eq!(error.status_code(), None);
    }

    #[test]
    fn test_transient_status_is_retryable() {
        let error = OpcUaError::browse(BrowseError::bad_status("i=85", 0x800A_0000));
        assert!(error.is_retryable());
        assert_eq!(error.to_string(), "Browse failed for node 'i=85': BadTimeout (0x800A0000)");
    }

    #[test]
    fn test_session_lost_classification() {
        let lost = OpcUaError::operation(OperationError::read_bad_status("ns=2;i=9", 0x8025_0000));
        assert!(lost.is_session_lost());
        assert_eq!(status_code_name(0x8025_0000), "BadSessionIdInvalid");
        assert!(OpcUaError::not_connected().is_session_lost());
        assert!(OpcUaError::method(MethodError::bad_status("ns=2;i=1", "ns=2;i=2", 0x80AE_0000))
            .is_session_lost());

        let timeout = OpcUaError::browse(BrowseError::bad_status("i=85", 0x800A_0000));
        assert!(timeout.is_retryable());
        assert!(!timeout.is_session_lost());
        assert!(!OpcUaError::operation(OperationError::read_bad_status("ns=2;i=9", 0x8034_0000))
            .is_session_lost());
        assert!(!OpcUaError::connection(ConnectionError::no_suitable_endpoint("None"))
            .is_session_lost());
    }

    #[test]
    fn test_invalid_argument_message() {
        let error = MethodError::invalid_argument("ns=2;s=Scale", 1, 0x8074_0000);
        assert_eq!(
            error.to_string(),
            "Argument 1 of method 'ns=2;s=Scale' rejected: BadTypeMismatch (0x80740000)"
        );
    }

    #[test]
    fn test_configuration_error() {
        let error = ConfigurationError::invalid_node_id("bad;format", "missing identifier");
        assert!(error.to_string().contains("bad;format"));
        assert_eq!(OpcUaError::from(error).category(), "configuration");
    }
}
