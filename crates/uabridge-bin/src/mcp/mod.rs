// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stdio tool server.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Tool Server                       │
//! │                                                          │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐   │
//! │  │  Transport  │───▶│   Server    │───▶│    Tools    │   │
//! │  │   (lines)   │    │ (JSON-RPC)  │    │ (catalogue) │   │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘   │
//! │                                               ▼          │
//! │                                        ┌─────────────┐   │
//! │                                        │ OpcUaBridge │   │
//! │                                        └─────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, ServerStatsSnapshot};
pub use tools::Tool;
pub use transport::{serve_lines, StopReason};
