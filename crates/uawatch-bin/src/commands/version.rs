// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("uawatch - OPC UA controller connection supervisor");
    println!();
    println!("Version Information:");
    println!("  uawatch-bin:    {}", crate::VERSION);
    println!("  uawatch-client: {}", uawatch_client::VERSION);
    println!("  uawatch-config: {}", uawatch_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!("  Transport:    opc.tcp (security policy None)");
    println!("  Config:       yaml, toml, json");
    println!("  Languages:    en, de");
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
