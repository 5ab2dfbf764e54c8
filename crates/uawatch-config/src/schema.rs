// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema for the uawatch supervisor.
//!
//! # Schema Structure
//!
//! ```text
//! AppConfig
//! ├── opcua: OpcUaConfig          (endpoint, credentials, subscription settings)
//! ├── supervisor: SupervisorConfig (poll interval, nodes, retry, language)
//! └── logging: LoggingConfig
//! ```
//!
//! The client types are owned by `uawatch-client`; this module only composes
//! them and adds the settings that belong to the process.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use uawatch_client::{OpcUaConfig, SupervisorConfig};

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration of a uawatch process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Session settings.
    #[serde(default)]
    pub opcua: OpcUaConfig,

    /// Supervisor settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.opcua.validate()?;
        self.supervisor.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes the configuration to pretty TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::serialization(e.to_string()))
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Extra filter directives appended to the level, e.g. `opcua=warn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(filter) = &self.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::validation(
                    "logging.filter",
                    "must not be empty when present",
                ));
            }
        }
        Ok(())
    }

    /// Returns the filter directive for the subscriber.
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(extra) => format!("{},{}", self.level.as_str(), extra.trim()),
            None => self.level.as_str().to_string(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one event per line.
    #[default]
    Text,
    /// Compact single-line format.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uawatch_client::Language;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = AppConfig::default();
        config.opcua.endpoint = "http://plc:4840".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Client(_)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.supervisor.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_filter_rejected() {
        let mut config = AppConfig::default();
        config.logging.filter = Some("  ".to_string());
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_type(), "validation");
    }

    #[test]
    fn test_directive() {
        let logging = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Json,
            filter: Some("opcua=warn".to_string()),
        };
        assert_eq!(logging.directive(), "debug,opcua=warn");
        assert_eq!(LoggingConfig::default().directive(), "info");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_toml_roundtrip_keeps_language() {
        let mut config = AppConfig::default();
        config.supervisor.language = Language::De;
        let text = config.to_toml().unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.supervisor.language, Language::De);
        assert_eq!(back, config);
    }
}
