// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! Configuration files and environment overrides carried all the way into a
//! running supervisor.
//!
//! Each test uses its own environment prefix so parallel tests do not see
//! each other's variables.

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use uawatch_client::{ConnectionState, Language, NodeId, OpcUaValue};
use uawatch_config::{AppConfig, ConfigError, ConfigFormat, ConfigLoader};
use uawatch_tests::prelude::*;

const PANEL_YAML: &str = r#"
opcua:
  endpoint: "${UAWATCH_IT_YAML_HOST:opc.tcp://panel-plc:4840}"
  application_name: "Panel"
supervisor:
  poll_interval: 50ms
  status_node: "ns=2;s=Controller.Running"
  nodes:
    - "ns=2;s=Axis.X"
    - "ns=2;s=Axis.Y"
  language: de
  scalar_attribute: value
  retry:
    max_attempts: 2
    initial_delay: 500ms
logging:
  level: debug
"#;

fn loader(prefix: &str) -> ConfigLoader {
    ConfigLoader::builder().env_prefix(prefix).build()
}

fn write_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_config_yaml_drives_supervisor() {
    init_test_logging();
    let file = write_file(".yaml", PANEL_YAML);
    let config = loader("UAWATCH_IT_YAML").load(file.path()).unwrap();

    assert_eq!(config.opcua.endpoint, "opc.tcp://panel-plc:4840");
    assert_eq!(config.supervisor.poll_interval, FAST_POLL);
    assert_eq!(config.supervisor.language, Language::De);

    let mut harness = SupervisorHarness::start(config.supervisor);
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    let axis_x: NodeId = "ns=2;s=Axis.X".parse().unwrap();
    let axis_y: NodeId = "ns=2;s=Axis.Y".parse().unwrap();
    assert_eq!(harness.control.monitored_nodes(), vec![axis_x.clone(), axis_y]);

    let statuses = harness.statuses().to_vec();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].message, "Verbunden, Steuerung im Run-Modus");

    assert!(harness.control.emit(&axis_x, OpcUaValue::Double(120.0)));
    assert_eq!(
        harness.handle.cache().get(&axis_x, "value"),
        Some(OpcUaValue::Double(120.0))
    );

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_config_retry_policy_applied() {
    let file = write_file(".yaml", PANEL_YAML);
    let config = loader("UAWATCH_IT_RETRY").load(file.path()).unwrap();

    let harness = SupervisorHarness::start_with(config.supervisor, |control| {
        control.set_connect(ConnectBehavior::RefuseAlways);
    });
    harness.wait_for(ConnectionState::Failed).await;

    assert_eq!(harness.control.connect_count(), 2);
    let gaps = harness.control.connect_gaps();
    assert_eq!(gaps.len(), 1);
    assert!(gaps[0] >= Duration::from_millis(500) && gaps[0] < Duration::from_millis(550));

    harness.shutdown().await;
}

#[test]
fn test_config_same_settings_in_every_format() {
    let toml = r#"
[opcua]
endpoint = "opc.tcp://plc:4840"

[supervisor]
poll_interval = "250ms"
nodes = ["ns=4;s=MAIN.myVar1"]
"#;
    let json = r#"{
        "opcua": { "endpoint": "opc.tcp://plc:4840" },
        "supervisor": { "poll_interval": "250ms", "nodes": ["ns=4;s=MAIN.myVar1"] }
    }"#;
    let yaml = "opcua:\n  endpoint: \"opc.tcp://plc:4840\"\nsupervisor:\n  poll_interval: 250ms\n  nodes: [\"ns=4;s=MAIN.myVar1\"]\n";

    let loader = loader("UAWATCH_IT_FORMATS");
    let from_toml = loader.load_from_str(toml, ConfigFormat::Toml).unwrap();
    let from_json = loader.load_from_str(json, ConfigFormat::Json).unwrap();
    let from_yaml = loader.load_from_str(yaml, ConfigFormat::Yaml).unwrap();

    assert_eq!(from_toml, from_json);
    assert_eq!(from_toml, from_yaml);
    assert_eq!(from_toml.supervisor.poll_interval, Duration::from_millis(250));
}

#[test]
fn test_config_toml_export_loads_back() {
    let file = write_file(".yaml", PANEL_YAML);
    let loader = loader("UAWATCH_IT_EXPORT");
    let original = loader.load(file.path()).unwrap();

    let exported = original.to_toml().unwrap();
    let reloaded = loader.load_from_str(&exported, ConfigFormat::Toml).unwrap();

    assert_eq!(original, reloaded);
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_config_env_overrides_file() {
    std::env::set_var("UAWATCH_IT_ENV_ENDPOINT", "opc.tcp://10.0.0.9:4840");
    std::env::set_var("UAWATCH_IT_ENV_POLL_INTERVAL_MS", "125");
    std::env::set_var("UAWATCH_IT_ENV_LANGUAGE", "en");

    let file = write_file(".yaml", PANEL_YAML);
    let config = loader("UAWATCH_IT_ENV").load(file.path()).unwrap();

    assert_eq!(config.opcua.endpoint, "opc.tcp://10.0.0.9:4840");
    assert_eq!(config.supervisor.poll_interval, Duration::from_millis(125));
    assert_eq!(config.supervisor.language, Language::En);
    // Untouched settings come from the file.
    assert_eq!(config.supervisor.retry.max_attempts, 2);

    std::env::remove_var("UAWATCH_IT_ENV_ENDPOINT");
    std::env::remove_var("UAWATCH_IT_ENV_POLL_INTERVAL_MS");
    std::env::remove_var("UAWATCH_IT_ENV_LANGUAGE");
}

#[test]
fn test_config_placeholder_resolved_from_env() {
    std::env::set_var("UAWATCH_IT_LINE2_HOST", "opc.tcp://line-2:4840");

    let yaml = PANEL_YAML.replace("UAWATCH_IT_YAML_HOST", "UAWATCH_IT_LINE2_HOST");
    let file = write_file(".yaml", &yaml);
    let config = loader("UAWATCH_IT_PLACEHOLDER").load(file.path()).unwrap();
    assert_eq!(config.opcua.endpoint, "opc.tcp://line-2:4840");

    std::env::remove_var("UAWATCH_IT_LINE2_HOST");
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_config_rejects_slow_backoff() {
    let yaml = "supervisor:\n  retry:\n    multiplier: 1.5\n";
    let result = loader("UAWATCH_IT_BACKOFF").load_from_str(yaml, ConfigFormat::Yaml);
    assert!(matches!(result, Err(ConfigError::Client(_))));
}

#[test]
fn test_config_rejects_duplicate_nodes() {
    let json = r#"{ "supervisor": { "nodes": ["ns=4;s=MAIN.a", "ns=4;s=MAIN.a"] } }"#;
    let result = loader("UAWATCH_IT_DUPES").load_from_str(json, ConfigFormat::Json);
    assert!(matches!(result, Err(ConfigError::Client(_))));
}

#[test]
fn test_config_rejects_unknown_section() {
    let toml = "[opcua]\nendpoint = \"opc.tcp://plc:4840\"\n\n[modbus]\nport = 502\n";
    let result = loader("UAWATCH_IT_UNKNOWN").load_from_str(toml, ConfigFormat::Toml);
    assert!(result.is_err());
}

#[test]
fn test_config_defaults_are_usable() {
    let config = AppConfig::default();
    config.validate().unwrap();
    assert_eq!(config.supervisor.status_node, NodeFixtures::status());
    assert_eq!(
        config.supervisor.nodes,
        vec![NodeFixtures::var("myVar1"), NodeFixtures::var("myVar2")]
    );
}
