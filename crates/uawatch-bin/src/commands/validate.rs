// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use uawatch_client::UserTokenType;
use uawatch_config::AppConfig;

use crate::cli::{Cli, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = uawatch_config::load_config(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

    let warnings = collect_warnings(&config);

    println!("✓ Configuration is valid: {}", config_path.display());
    println!();
    println!("Summary:");
    println!("  Endpoint:       {}", config.opcua.endpoint);
    println!(
        "  User:           {}",
        config.opcua.user_token.username().unwrap_or("(anonymous)")
    );
    println!("  Status node:    {}", config.supervisor.status_node);
    println!("  Nodes:          {}", config.supervisor.nodes.len());
    println!(
        "  Poll interval:  {}",
        humantime::format_duration(config.supervisor.poll_interval)
    );
    println!(
        "  Retry:          {} attempts, first wait {}",
        config.supervisor.retry.max_attempts,
        humantime::format_duration(config.supervisor.retry.initial_delay)
    );
    println!("  Language:       {:?}", config.supervisor.language);

    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &warnings {
            println!("  ⚠ {}", warning);
        }
    }

    if args.show_config {
        println!();
        println!("Effective configuration:");
        println!("{}", redacted(&config).to_toml()?);
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Settings that load fine but are probably mistakes.
fn collect_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.supervisor.nodes.is_empty() {
        warnings.push("No nodes configured; nothing will be subscribed".to_string());
    }

    if config.supervisor.nodes.contains(&config.supervisor.status_node) {
        warnings.push(format!(
            "Status node {} is also subscribed as a data node",
            config.supervisor.status_node
        ));
    }

    if config.opcua.user_token.username().is_some() {
        warnings.push(
            "User credentials are sent over an endpoint without message security".to_string(),
        );
    }

    warnings
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if let UserTokenType::UserName { password, .. } = &mut config.opcua.user_token {
        *password = "********".to_string();
    }
    config
}
