// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Supervise the controller connection (default)
//! - `validate`: Validate the configuration file
//! - `version`: Show version information
//! - `write`: Write one value once the controller is healthy

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uawatch - OPC UA controller connection supervisor
///
/// Keeps a session to an OPC UA server alive, watches the controller's
/// run-mode flag and mirrors subscribed values for an operator panel.
#[derive(Parser, Debug)]
#[command(
    name = "uawatch",
    author = "Sylvex <contact@sylvex.io>",
    version = uawatch_client::VERSION,
    about = "OPC UA controller connection supervisor",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uawatch.yaml",
        env = "UAWATCH_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long, env = "UAWATCH_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the file
    #[arg(long, env = "UAWATCH_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

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

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Supervise the connection until a shutdown signal arrives
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,

    /// Write a value once the controller is running
    Write(WriteArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the endpoint from the configuration file
    #[arg(short, long)]
    pub endpoint: Option<String>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Print the effective configuration as TOML
    #[arg(short, long)]
    pub show_config: bool,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Target node, e.g. `ns=2;s=Axis.X.Target`
    #[arg(short, long)]
    pub node: String,

    /// Value to write
    #[arg(long, required_unless_present = "pulse")]
    pub value: Option<String>,

    /// How to interpret the value
    #[arg(short = 't', long = "type", default_value = "text")]
    pub value_type: ValueType,

    /// Write true, wait the pulse width, then write false
    #[arg(long, conflicts_with_all = ["value", "button"])]
    pub pulse: bool,

    /// Confirm button pulsed after writing a numeric value to the node
    #[arg(long, requires = "value")]
    pub button: Option<String>,

    /// How long to wait for a running controller
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
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

impl From<uawatch_config::LogFormat> for LogFormat {
    fn from(format: uawatch_config::LogFormat) -> Self {
        match format {
            uawatch_config::LogFormat::Text => LogFormat::Text,
            uawatch_config::LogFormat::Json => LogFormat::Json,
            uawatch_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Interpretation of `write --value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ValueType {
    /// `true`/`false`, `1`/`0`, `on`/`off`
    Bool,
    /// Unsigned integer
    Int,
    /// Floating point number
    Float,
    /// Plain text
    #[default]
    Text,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level; flags win over `--log-level`, which wins
    /// over the configured level.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
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
        let cli = Cli::parse_from(["uawatch"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_endpoint_override() {
        let cli = Cli::parse_from(["uawatch", "run", "-e", "opc.tcp://plc:4840"]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.endpoint.as_deref(), Some("opc.tcp://plc:4840"))
            }
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["uawatch", "-c", "/etc/uawatch/panel.toml", "validate"]);
        assert_eq!(cli.config, PathBuf::from("/etc/uawatch/panel.toml"));
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = Cli::parse_from(["uawatch", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("info"), "trace");

        let cli = Cli::parse_from(["uawatch", "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["uawatch", "-v"]);
        assert_eq!(cli.effective_log_level("info"), "debug");
    }

    #[test]
    fn test_write_command() {
        let cli = Cli::parse_from([
            "uawatch", "write", "--node", "ns=2;s=Speed", "--value", "12.5", "--type", "float",
            "--timeout", "3s",
        ]);
        match cli.command {
            Some(Commands::Write(args)) => {
                assert_eq!(args.node, "ns=2;s=Speed");
                assert_eq!(args.value.as_deref(), Some("12.5"));
                assert_eq!(args.value_type, ValueType::Float);
                assert_eq!(args.timeout, Duration::from_secs(3));
                assert!(!args.pulse);
            }
            other => panic!("Expected Write command, got {:?}", other),
        }
    }

    #[test]
    fn test_write_pulse_needs_no_value() {
        let cli = Cli::parse_from(["uawatch", "write", "--node", "ns=2;s=Start", "--pulse"]);
        match cli.command {
            Some(Commands::Write(args)) => {
                assert!(args.pulse);
                assert!(args.value.is_none());
                assert_eq!(args.timeout, Duration::from_secs(10));
            }
            other => panic!("Expected Write command, got {:?}", other),
        }
    }

    #[test]
    fn test_write_requires_value_without_pulse() {
        let result = Cli::try_parse_from(["uawatch", "write", "--node", "ns=2;s=Start"]);
        assert!(result.is_err());
    }
}
