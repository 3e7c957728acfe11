// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge between a tool-calling client and an OPC UA server.
//!
//! The crate turns a small set of text-in, text-out operations into OPC UA
//! service calls over a single lazily opened session.
//!
//! # Features
//!
//! - Lazy, single-flight session management with clean teardown
//! - Value coercion from caller text to the node's current type
//! - Single and batched reads and writes with per-element results
//! - Method calls with numeric argument detection
//! - Depth-first variable discovery below the Objects folder
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and session establishment
//! ├── Browse        - Reference browsing failures
//! ├── Operation     - Read and write failures, bad statuses
//! ├── Method        - Method call failures
//! ├── Conversion    - Text that does not fit the node's type
//! └── Configuration - Invalid node ids and settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uabridge_opcua::{OpcUaBridge, OpcUaConfig, RealOpcUaTransport};
//! use uabridge_opcua::bridge::ReadNodeRequest;
//!
//! let config = OpcUaConfig::from_env();
//! let bridge = OpcUaBridge::new(RealOpcUaTransport::new(config));
//!
//! let output = bridge
//!     .read_node(ReadNodeRequest { node_id: "ns=2;i=2".into() })
//!     .await;
//! println!("{}", output.text);
//!
//! bridge.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod client;
pub mod coercion;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ConversionError, MethodError, OpcUaError,
    OpcUaResult, OperationError,
};

pub use types::{
    AttributeId, NodeClass, NodeId, NodeIdentifier, OpcUaConfig, OpcUaDataType, QualifiedName,
};

pub use bridge::{OpcUaBridge, ToolOutput};
pub use client::{ConnectionManager, OpcUaTransport, OpcUaValue, TransportState};
pub use discovery::{DiscoveryOptions, DiscoveryWalker, VariableRecord};
pub use executor::{BatchEntry, ChildRef, MethodCall, OperationExecutor, WriteRequest};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
