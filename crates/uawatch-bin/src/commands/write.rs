// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use tracing::info;
use uawatch_client::{NodeId, OpcUaTransport, SupervisorHandle, WriteValue};

use crate::cli::{Cli, ValueType, WriteArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::{build_transport, RuntimeBuilder, SupervisorRuntime};

/// Executes the `write` command.
///
/// Starts a supervisor, waits for a running controller, performs the write
/// and shuts down again.
pub async fn write(cli: &Cli, args: WriteArgs) -> BinResult<()> {
    let node = parse_node(&args.node)?;
    let button = args.button.as_deref().map(parse_node).transpose()?;
    let value = match (&args.value, args.pulse) {
        (Some(text), false) if button.is_none() => Some(parse_value(text, args.value_type)?),
        _ => None,
    };

    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    let transport = build_transport(runtime.config());
    let (handle, events) = runtime.start(transport)?;

    let result = perform(&runtime, &handle, &args, &node, value, button.as_ref()).await;

    handle.shutdown().await;
    events.abort();

    if result.is_ok() {
        println!("✓ Write to {} acknowledged", node);
    }
    result
}

async fn perform<T: OpcUaTransport + 'static>(
    runtime: &SupervisorRuntime,
    handle: &SupervisorHandle<T>,
    args: &WriteArgs,
    node: &NodeId,
    value: Option<WriteValue>,
    button: Option<&NodeId>,
) -> BinResult<()> {
    tokio::select! {
        waited = SupervisorRuntime::wait_until_healthy(handle, args.timeout) => waited?,
        _ = runtime.shutdown_coordinator().wait_for_shutdown() => {
            return Err(BinError::runtime("interrupted before the write"));
        }
    }

    let writer = handle.writer();
    match (value, button, args.value.as_deref()) {
        (Some(value), _, _) => {
            info!(node_id = %node, %value, "Writing value");
            writer.write_value(node, value).await?;
        }
        (None, Some(button), Some(text)) => {
            info!(node_id = %node, button = %button, value = text, "Writing absolute position");
            writer.write_absolute(node, text, button).await?;
        }
        _ => {
            info!(node_id = %node, width = ?writer.pulse_width(), "Pulsing");
            writer.pulse(node).await?;
        }
    }
    Ok(())
}

fn parse_node(text: &str) -> BinResult<NodeId> {
    text.parse::<NodeId>()
        .map_err(|e| BinError::from(e).with_context(format!("invalid node '{}'", text)))
}

/// Parses the command-line text of a value.
pub fn parse_value(text: &str, value_type: ValueType) -> BinResult<WriteValue> {
    let trimmed = text.trim();
    let invalid = |expected: &str| BinError::config(format!("'{}' is not {}", text, expected));

    match value_type {
        ValueType::Bool => match trimmed.to_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Ok(WriteValue::Boolean(true)),
            "false" | "0" | "off" | "no" => Ok(WriteValue::Boolean(false)),
            _ => Err(invalid("a boolean")),
        },
        ValueType::Int => trimmed
            .parse::<i64>()
            .map(WriteValue::Integer)
            .map_err(|_| invalid("an integer")),
        ValueType::Float => trimmed
            .parse::<f64>()
            .map(WriteValue::Float)
            .map_err(|_| invalid("a number")),
        ValueType::Text => Ok(WriteValue::Text(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_value("ON", ValueType::Bool).unwrap(), WriteValue::Boolean(true));
        assert_eq!(parse_value("0", ValueType::Bool).unwrap(), WriteValue::Boolean(false));
        assert!(parse_value("maybe", ValueType::Bool).is_err());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_value(" 42 ", ValueType::Int).unwrap(), WriteValue::Integer(42));
        assert_eq!(parse_value("-1.5", ValueType::Float).unwrap(), WriteValue::Float(-1.5));
        assert!(parse_value("4.2", ValueType::Int).is_err());
        assert!(parse_value("abc", ValueType::Float).is_err());
    }

    #[test]
    fn test_parse_text_is_verbatim() {
        assert_eq!(
            parse_value(" hello ", ValueType::Text).unwrap(),
            WriteValue::Text(" hello ".to_string())
        );
    }

    #[test]
    fn test_parse_node() {
        assert!(parse_node("ns=2;s=Start").is_ok());
        let err = parse_node("Start").unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }
}
