// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;
use crate::mcp::MCP_PROTOCOL_VERSION;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("uabridge - OPC UA tool bridge");
    println!();
    println!("Version Information:");
    println!("  uabridge-bin:   {}", crate::VERSION);
    println!("  uabridge-opcua: {}", uabridge_opcua::VERSION);
    println!("  Tool protocol:  {}", MCP_PROTOCOL_VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:         {}", std::env::consts::ARCH);
    println!("  OS:             {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  OPC UA client:  {}",
        if cfg!(feature = "real-transport") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
