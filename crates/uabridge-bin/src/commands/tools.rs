// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `tools` command.

use anyhow::Context;

use crate::cli::Cli;
use crate::error::BinResult;
use crate::mcp::tools::tool_definitions;

/// Prints the tool catalogue as pretty JSON.
pub fn tools(_cli: &Cli) -> BinResult<()> {
    let catalogue = serde_json::to_string_pretty(&tool_definitions())
        .context("Failed to serialize tool catalogue")?;
    println!("{}", catalogue);
    Ok(())
}
