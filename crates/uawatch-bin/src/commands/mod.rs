// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Supervise the controller connection
//! - `validate`: Validate the configuration file
//! - `version`: Show version information
//! - `write`: Write one value once the controller is healthy

mod run;
mod validate;
mod version;
mod write;

pub use run::run;
pub use validate::validate;
pub use version::version;
pub use write::{parse_value, write};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Write(args) => write::write(&cli, args).await,
    }
}
