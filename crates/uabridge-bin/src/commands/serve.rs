// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `serve` command.

use tracing::info;

use crate::cli::{Cli, ServeArgs};
use crate::config::BridgeConfig;
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Executes the `serve` command: runs the tool server on stdin/stdout.
pub async fn serve(cli: &Cli, args: ServeArgs) -> BinResult<()> {
    let config = BridgeConfig::load(cli.config.as_deref(), cli.endpoint.as_deref())?;
    info!(endpoint = %config.opcua.endpoint, "Preparing tool server");

    let builder = RuntimeBuilder::new()
        .config(config)
        .max_depth(args.max_depth);
    start(builder).await
}

#[cfg(feature = "real-transport")]
async fn start(builder: RuntimeBuilder) -> BinResult<()> {
    builder.build()?.run_stdio().await
}

#[cfg(not(feature = "real-transport"))]
async fn start(_builder: RuntimeBuilder) -> BinResult<()> {
    Err(crate::error::BinError::init(super::MISSING_TRANSPORT))
}
