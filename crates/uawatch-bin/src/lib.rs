// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawatch-bin
//!
//! Command-line front end of the uawatch supervisor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!                   ┌──────▼──────┐
//!                   │  shutdown   │
//!                   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Supervise (default command)
//! uawatch -c /etc/uawatch/panel.yaml
//!
//! # Validate configuration
//! uawatch validate --show-config
//!
//! # Pulse a start button once the controller runs
//! uawatch write --node "ns=4;s=MAIN.bStart" --pulse
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RuntimeBuilder, SupervisorRuntime};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initializes logging from the flags and, when it loads, the
/// configuration file.
pub fn init_logging_for(cli: &Cli) -> BinResult<()> {
    let logging = match cli.command {
        Some(Commands::Version) => uawatch_config::LoggingConfig::default(),
        _ => uawatch_config::load_config(&cli.config)
            .map(|config| config.logging)
            .unwrap_or_default(),
    };

    let directive = match (&cli.log_level, cli.quiet, cli.verbose) {
        (None, false, false) => logging.directive(),
        _ => cli.effective_log_level(logging.level.as_str()).to_string(),
    };
    let format = cli.log_format.unwrap_or_else(|| logging.format.into());

    init_logging(&directive, format)
}
