// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-bin
//!
//! CLI binary that serves OPC UA operations as tools over stdio.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! │                      (Entry Point)                          │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        │          │ │          │ │ (stderr) │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!               ┌──────────┼──────────┐
//!               ▼                     ▼
//!        ┌─────────────┐       ┌─────────────┐
//!        │     mcp     │       │  shutdown   │
//!        │ (JSON-RPC)  │       │ (Graceful)  │
//!        └──────┬──────┘       └─────────────┘
//!               │
//!        ┌──────▼───────┐
//!        │uabridge-opcua│
//!        └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Serve tools on stdin/stdout (default command)
//! OPCUA_SERVER_URL=opc.tcp://plc:4840 uabridge
//!
//! # Check connectivity
//! uabridge check -e opc.tcp://plc:4840
//!
//! # Print the tool catalogue
//! uabridge tools
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use config::BridgeConfig;
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{BridgeRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
