// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uawatch - OPC UA controller connection supervisor.

use std::process::ExitCode;

use uawatch_bin::cli::Cli;
use uawatch_bin::error::report_error;
use uawatch_bin::{commands, init_logging_for};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging_for(&cli) {
        report_error(&e);
        return exit_code(e.exit_code());
    }

    match commands::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
