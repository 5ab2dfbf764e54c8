// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::{build_transport, RuntimeBuilder};

/// Executes the `run` command.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .endpoint(args.endpoint)
        .build()?;

    let transport = build_transport(runtime.config());
    runtime.run(transport).await
}
