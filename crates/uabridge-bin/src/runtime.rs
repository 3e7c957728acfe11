// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge runtime orchestration.
//!
//! The runtime wires a transport into an [`OpcUaBridge`], serves it over a
//! line-delimited reader/writer pair and closes the OPC UA session on every
//! exit path: end of input, OS signal, or an I/O failure on the channel.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{info, warn};
use uabridge_opcua::{ConnectionManager, OpcUaBridge, OpcUaTransport};

use crate::config::BridgeConfig;
use crate::error::BinResult;
use crate::mcp::{serve_lines, McpServer, StopReason};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// BridgeRuntime
// =============================================================================

/// Runs the tool server over one bridge until input ends or shutdown.
pub struct BridgeRuntime<T: OpcUaTransport> {
    bridge: Arc<OpcUaBridge<T>>,
    shutdown: ShutdownCoordinator,
    handle_signals: bool,
}

impl<T: OpcUaTransport> BridgeRuntime<T> {
    /// Returns the bridge.
    pub fn bridge(&self) -> &Arc<OpcUaBridge<T>> {
        &self.bridge
    }

    /// Returns a handle that can stop the runtime.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Serves on the process's stdin and stdout.
    pub async fn run_stdio(self) -> BinResult<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await.map(drop)
    }

    /// Serves on the given channel. The session is closed before returning,
    /// whether serving ended normally or with an error.
    pub async fn run<R, W>(self, reader: R, writer: W) -> BinResult<StopReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            version = crate::VERSION,
            endpoint = %self.bridge.manager().endpoint(),
            "Starting OPC UA tool server"
        );

        let signals = self.handle_signals.then(|| self.shutdown.listen_for_signals());
        let server = McpServer::new(Arc::clone(&self.bridge));

        let result = serve_lines(&server, reader, writer, self.shutdown.shutdown_signal()).await;
        if let Err(e) = &result {
            warn!(error = %e, "Tool server stopped with an error");
        }

        self.bridge.shutdown().await;
        if let Some(signals) = signals {
            signals.abort();
        }

        info!(
            server = ?server.stats().snapshot(),
            operations = ?self.bridge.executor().stats().snapshot(),
            connection = ?self.bridge.manager().stats().snapshot(),
            "OPC UA tool server stopped"
        );
        result
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for BridgeRuntime<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeRuntime")
            .field("bridge", &self.bridge)
            .field("handle_signals", &self.handle_signals)
            .finish()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the bridge runtime.
#[derive(Debug)]
pub struct RuntimeBuilder {
    config: BridgeConfig,
    max_depth: Option<usize>,
    handle_signals: bool,
}

impl RuntimeBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            max_depth: None,
            handle_signals: true,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the discovery depth from the configuration.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enables or disables OS signal handling.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Returns the configuration the runtime will use.
    pub fn bridge_config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Builds the runtime around a caller-supplied transport.
    pub fn build_with<T: OpcUaTransport>(self, transport: T) -> BinResult<BridgeRuntime<T>> {
        transport.config().validate()?;

        let discovery = self.config.discovery_options(self.max_depth);
        let manager = Arc::new(ConnectionManager::new(transport));
        Ok(BridgeRuntime {
            bridge: Arc::new(OpcUaBridge::with_manager(manager, discovery)),
            shutdown: ShutdownCoordinator::new(),
            handle_signals: self.handle_signals,
        })
    }

    /// Builds the runtime around a transport for a real server.
    #[cfg(feature = "real-transport")]
    pub fn build(self) -> BinResult<BridgeRuntime<uabridge_opcua::RealOpcUaTransport>> {
        let transport = uabridge_opcua::RealOpcUaTransport::new(self.config.opcua.clone());
        self.build_with(transport)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
