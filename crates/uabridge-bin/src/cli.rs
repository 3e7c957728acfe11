// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `serve`: Run the stdio tool server (default)
//! - `check`: Connect once, list the children of a node and disconnect
//! - `tools`: Print the tool catalogue as JSON
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uabridge_opcua::types::ENDPOINT_ENV_VAR;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uabridge - OPC UA tool bridge
///
/// Exposes reads, writes, browsing, method calls and variable discovery of
/// one OPC UA server as tools over a line-delimited JSON-RPC stdio channel.
#[derive(Parser, Debug)]
#[command(
    name = "uabridge",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "Tool-calling bridge for OPC UA servers",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// OPC UA server endpoint URL
    #[arg(short, long, env = ENDPOINT_ENV_VAR, global = true)]
    pub endpoint: Option<String>,

    /// Optional configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "UABRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "UABRIDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, default_value = "text", env = "UABRIDGE_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the uabridge CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve tools over stdin/stdout
    ///
    /// This is the default command when no subcommand is specified. The OPC UA
    /// session is opened on the first tool call, not at startup.
    Serve(ServeArgs),

    /// Check connectivity to the configured server
    ///
    /// Connects, lists the children of a node and disconnects.
    Check(CheckArgs),

    /// Print the tool catalogue
    Tools,

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Limit the depth of `get_all_variables` below the Objects folder
    #[arg(long)]
    pub max_depth: Option<usize>,
}

/// Arguments for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Node whose children are listed
    #[arg(short, long, default_value = "i=85")]
    pub node: String,

    /// Output format for the result
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl Default for CheckArgs {
    fn default() -> Self {
        Self {
            node: "i=85".to_string(),
            format: OutputFormat::Text,
        }
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Serve` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["uabridge"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Serve(_)));
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::parse_from(["uabridge", "serve", "--max-depth", "3"]);
        if let Some(Commands::Serve(args)) = cli.command {
            assert_eq!(args.max_depth, Some(3));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::parse_from(["uabridge", "check", "-n", "ns=2;s=Boiler", "-f", "json"]);
        if let Some(Commands::Check(args)) = cli.command {
            assert_eq!(args.node, "ns=2;s=Boiler");
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_check_defaults_to_objects_folder() {
        let cli = Cli::parse_from(["uabridge", "check"]);
        if let Some(Commands::Check(args)) = cli.command {
            assert_eq!(args.node, "i=85");
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_endpoint_flag() {
        let cli = Cli::parse_from(["uabridge", "-e", "opc.tcp://plc:4840", "serve"]);
        assert_eq!(cli.endpoint.as_deref(), Some("opc.tcp://plc:4840"));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["uabridge", "-c", "/etc/uabridge.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/uabridge.yaml")));
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::parse_from(["uabridge", "-l", "debug"]);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_quiet_mode() {
        let cli = Cli::parse_from(["uabridge", "-q"]);
        assert!(cli.quiet);
        assert_eq!(cli.effective_log_level(), "warn");
    }

    #[test]
    fn test_verbose_mode() {
        let cli = Cli::parse_from(["uabridge", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.effective_log_level(), "debug");
    }
}
