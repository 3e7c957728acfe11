// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! The stdio server stops when the client closes stdin or when shutdown is
//! requested. OS signals (SIGTERM, SIGINT and SIGQUIT on Unix, Ctrl+C
//! elsewhere) request it through [`ShutdownCoordinator::initiate_shutdown`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across tasks.
///
/// Clones share one flag. Once raised it stays raised, so a signal
/// created after the fact still resolves.
///
/// # Example
///
/// ```ignore
/// use uabridge_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
/// coordinator.listen_for_signals();
///
/// coordinator.shutdown_signal().wait().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator with shutdown not yet initiated.
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Returns a handle that resolves once shutdown is initiated.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.flag.subscribe(),
        }
    }

    /// Initiates shutdown. Later calls are no-ops.
    pub fn initiate_shutdown(&self) {
        let first = self.flag.send_if_modified(|raised| !std::mem::replace(raised, true));
        if first {
            info!("Shutdown initiated");
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.flag.borrow()
    }

    /// Spawns a task that initiates shutdown on the first OS signal.
    ///
    /// If the handlers cannot be registered, a warning is logged and only
    /// stdin EOF or a manual call ends the process.
    pub fn listen_for_signals(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            match wait_for_os_signal().await {
                Ok(name) => {
                    info!(signal = name, "Received signal");
                    coordinator.initiate_shutdown();
                }
                Err(e) => warn!(error = %e, "Failed to register signal handlers"),
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// Resolves when shutdown is initiated, including before it was created.
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        // With every coordinator dropped the flag can never be raised.
        let raised = self.receiver.wait_for(|raised| *raised).await.is_ok();
        if !raised {
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
