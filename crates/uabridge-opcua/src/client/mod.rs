// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client plumbing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          OperationExecutor / DiscoveryWalker                    │
//! │         (read, write, browse, call, discovery)                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ConnectionManager                            │
//! │          (lazy, single-flight session ownership)                │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    OpcUaTransport                               │
//! │     (RealOpcUaTransport with `real-transport`, or a test mock)  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod connection;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use connection::{ConnectionManager, ConnectionStats, ConnectionStatsSnapshot};
pub use transport::{
    BrowseResult, CallResult, OpcUaTransport, OpcUaValue, ReadResult, TransportState, WriteResult,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
