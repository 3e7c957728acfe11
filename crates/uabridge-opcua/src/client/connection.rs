// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lazy, single-flight connection management.
//!
//! The bridge holds at most one session to one server. The first operation
//! opens it; later operations reuse it. Concurrent first callers all wait
//! on the same connection attempt instead of opening sessions of their own.
//!
//! # Connection Lifecycle
//!
//! ```text
//! ┌──────────────┐  ensure_connection   ┌────────────┐   ok    ┌───────────┐
//! │ Disconnected │ ───────────────────► │ Connecting │ ──────► │ Connected │
//! └──────────────┘                      └────────────┘         └───────────┘
//!        ▲                                    │ error                │
//!        │         cleanup, error returned    │                      │
//!        ├────────────────────────────────────┘                      │
//!        │               disconnect, or session lost                 │
//!        └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A session can die underneath the bridge: the server restarts, or drops
//! it after the session timeout. Operations report such failures through
//! [`ConnectionManager::handle_error`], which closes the dead session so the
//! next operation opens a new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, OpcUaError, OpcUaResult};
use crate::types::OpcUaConfig;

use super::transport::{OpcUaTransport, TransportState};

// =============================================================================
// ConnectionStats
// =============================================================================

/// Counters describing the manager's connection history.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Sessions successfully opened.
    connects: AtomicU64,

    /// Connection attempts that failed.
    connect_failures: AtomicU64,

    /// Sessions closed through `disconnect`.
    disconnects: AtomicU64,

    /// Sessions found dead by a failed operation.
    sessions_lost: AtomicU64,
}

impl ConnectionStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_session_lost(&self) {
        self.sessions_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of sessions opened.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connection attempts.
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of sessions closed.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Returns the number of sessions found dead.
    pub fn sessions_lost(&self) -> u64 {
        self.sessions_lost.load(Ordering::Relaxed)
    }

    /// Returns a serializable copy of the counters.
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            connects: self.connects(),
            connect_failures: self.connect_failures(),
            disconnects: self.disconnects(),
            sessions_lost: self.sessions_lost(),
        }
    }
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatsSnapshot {
    /// Sessions successfully opened.
    pub connects: u64,
    /// Connection attempts that failed.
    pub connect_failures: u64,
    /// Sessions closed through `disconnect`.
    pub disconnects: u64,
    /// Sessions found dead.
    pub sessions_lost: u64,
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns the transport and hands out access to a live session.
///
/// Operations hold a shared lock on the transport for their duration;
/// connecting and disconnecting take the lock exclusively. Because the
/// connected check is repeated under the exclusive lock, callers racing to
/// connect produce exactly one session.
pub struct ConnectionManager<T: OpcUaTransport> {
    /// Configuration.
    config: OpcUaConfig,

    /// The transport, guarded for single-flight connection.
    transport: RwLock<T>,

    /// Connection counters.
    stats: ConnectionStats,
}

impl<T: OpcUaTransport> ConnectionManager<T> {
    /// Creates a manager. No connection is attempted until first use.
    pub fn new(transport: T) -> Self {
        let config = transport.config().clone();
        Self {
            config,
            transport: RwLock::new(transport),
            stats: ConnectionStats::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OpcUaConfig {
        &self.config
    }

    /// Returns the server endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Returns the connection counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Returns the current transport state.
    pub async fn state(&self) -> TransportState {
        self.transport.read().await.state()
    }

    /// Returns `true` if a session is currently open.
    pub async fn is_connected(&self) -> bool {
        self.transport.read().await.is_connected()
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Opens a session if none is open.
    ///
    /// Idempotent: with a session already open this returns immediately.
    /// On failure the transport is cleaned up and left disconnected so that
    /// a later call tries again.
    pub async fn ensure_connection(&self) -> OpcUaResult<()> {
        self.session().await.map(drop)
    }

    /// Returns shared access to a connected transport, connecting first if
    /// needed.
    pub async fn session(&self) -> OpcUaResult<RwLockReadGuard<'_, T>> {
        {
            let transport = self.transport.read().await;
            if transport.is_connected() {
                return Ok(transport);
            }
        }

        let mut transport = self.transport.write().await;
        if !transport.is_connected() {
            self.connect_locked(&mut transport).await?;
        }
        Ok(transport.downgrade())
    }

    async fn connect_locked(&self, transport: &mut T) -> OpcUaResult<()> {
        if transport.state() != TransportState::Disconnected {
            // Stale session from a dead connection.
            if let Err(e) = transport.disconnect().await {
                debug!(error = %e, "Closing stale session failed");
            }
        }
        debug!(endpoint = %self.config.endpoint, "Opening OPC UA session");

        let timeout = self.config.connect_timeout;
        let result = match tokio::time::timeout(timeout, transport.connect()).await {
            Ok(result) => result,
            Err(_) => Err(OpcUaError::connection(ConnectionError::timed_out(
                &self.config.endpoint,
                timeout,
            ))),
        };

        match result {
            Ok(()) => {
                self.stats.record_connect();
                info!(
                    endpoint = %self.config.endpoint,
                    transport = %transport.display_name(),
                    "OPC UA session established"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.record_connect_failure();
                e.log("connect");
                // Drop any half-open state so the next call starts clean.
                if let Err(cleanup) = transport.disconnect().await {
                    debug!(error = %cleanup, "Cleanup after failed connect also failed");
                }
                Err(e)
            }
        }
    }

    /// Reacts to an operation failure.
    ///
    /// If `error` shows the session is gone, the session is closed so that
    /// the next operation reconnects. Any other error leaves the session
    /// alone. Must not be called while holding a guard from
    /// [`session`](Self::session).
    pub async fn handle_error(&self, error: &OpcUaError) {
        if !error.is_session_lost() {
            return;
        }

        let mut transport = self.transport.write().await;
        if transport.state() == TransportState::Disconnected {
            return;
        }
        warn!(
            endpoint = %self.config.endpoint,
            error = %error,
            "OPC UA session lost, reconnecting on next operation"
        );
        self.stats.record_session_lost();
        if let Err(e) = transport.disconnect().await {
            debug!(error = %e, "Closing lost session failed");
        }
    }

    /// Closes the session, then the transport.
    ///
    /// Never fails: teardown errors are logged and swallowed, and the
    /// manager is left disconnected either way.
    pub async fn disconnect(&self) {
        let mut transport = self.transport.write().await;
        if transport.state() == TransportState::Disconnected {
            debug!(endpoint = %self.config.endpoint, "Disconnect requested with no open session");
            return;
        }

        match transport.disconnect().await {
            Ok(()) => info!(endpoint = %self.config.endpoint, "OPC UA session closed"),
            Err(e) => warn!(
                endpoint = %self.config.endpoint,
                error = %e,
                "Error while closing OPC UA session"
            ),
        }
        self.stats.record_disconnect();
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
