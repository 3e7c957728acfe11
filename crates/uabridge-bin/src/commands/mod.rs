// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `serve`: Run the stdio tool server
//! - `check`: One-shot connectivity check
//! - `tools`: Print the tool catalogue
//! - `version`: Show version information

mod check;
mod serve;
mod tools;
mod version;

pub use check::{check, check_with};
pub use serve::serve;
pub use tools::tools;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Message for commands that need a server connection in a build without one.
#[cfg(not(feature = "real-transport"))]
pub(crate) const MISSING_TRANSPORT: &str =
    "this build has no OPC UA transport; rebuild with the `real-transport` feature";

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Serve(args) => serve::serve(&cli, args).await,
        Commands::Check(args) => check::check(&cli, args).await,
        Commands::Tools => tools::tools(&cli),
        Commands::Version => version::version(&cli),
    }
}
