// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Expand `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Deserialize into [`AppConfig`]
//! 4. Apply `UAWATCH_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAWATCH_ENDPOINT=opc.tcp://plc:4840
//! UAWATCH_USERNAME=operator
//! UAWATCH_PASSWORD=secret
//! UAWATCH_POLL_INTERVAL_MS=250
//! UAWATCH_LANGUAGE=de
//! UAWATCH_LOG_LEVEL=debug
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AppConfig, LogLevel};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use uawatch_client::{Language, UserTokenType};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "UAWATCH";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`AppConfig`] from YAML, TOML or JSON.
///
/// # Examples
///
/// ```no_run
/// use uawatch_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("uawatch.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether placeholders and overrides are applied.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `UAWATCH` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholder expansion and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;

        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config: AppConfig = parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(&mut config)?;

        debug!(
            endpoint = %config.opcua.endpoint,
            nodes = config.supervisor.nodes.len(),
            poll_interval = ?config.supervisor.poll_interval,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: AppConfig = parse_str(&content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn finish(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Resolves `${VAR_NAME}` or `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are kept verbatim.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (env::var(var_name), default_value) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!("Environment variable '{}' not found", var_name);
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = env::var(&name).ok();
        (name, value)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let (_, Some(value)) = self.var("ENDPOINT") {
            config.opcua.endpoint = value;
        }

        let (_, username) = self.var("USERNAME");
        let (_, password) = self.var("PASSWORD");
        match (username, password) {
            (Some(username), password) => {
                let password = password
                    .or_else(|| match &config.opcua.user_token {
                        UserTokenType::UserName { password, .. } => Some(password.clone()),
                        UserTokenType::Anonymous => None,
                    })
                    .unwrap_or_default();
                config.opcua.user_token = UserTokenType::UserName { username, password };
            }
            (None, Some(new_password)) => {
                if let UserTokenType::UserName { password, .. } = &mut config.opcua.user_token {
                    *password = new_password;
                } else {
                    warn!(
                        "{}_PASSWORD is set but no username is configured; ignoring",
                        self.env_prefix
                    );
                }
            }
            (None, None) => {}
        }

        if let (name, Some(value)) = self.var("POLL_INTERVAL_MS") {
            let millis: u64 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(&name, "expected milliseconds"))?;
            config.supervisor.poll_interval = Duration::from_millis(millis);
        }

        if let (name, Some(value)) = self.var("LANGUAGE") {
            config.supervisor.language = value
                .parse::<Language>()
                .map_err(|e| ConfigError::invalid_env_var(&name, e))?;
        }

        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            config.logging.level = LogLevel::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(&name, "expected a log level"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for [`ConfigLoader`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Builds the loader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(enabled) = self.resolve_env_vars {
            loader.resolve_env_vars = enabled;
        }
        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOML: &str = r#"
[opcua]
endpoint = "opc.tcp://plc.local:4840"
application_name = "Panel"

[opcua.user_token.user_name]
username = "operator"
password = "secret"

[supervisor]
poll_interval = "500ms"
status_node = "ns=2;s=Controller.Running"
nodes = ["ns=2;s=Axis.X", "ns=2;s=Axis.Y"]
language = "de"

[supervisor.retry]
max_attempts = 4
initial_delay = "1s"

[logging]
level = "debug"
format = "json"
"#;

    /// Loader isolated from the process environment.
    fn loader(prefix: &str) -> ConfigLoader {
        ConfigLoader::builder().env_prefix(prefix).build()
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(TOML.as_bytes()).unwrap();

        let config = loader("UAWATCH_TEST_TOML").load(file.path()).unwrap();
        assert_eq!(config.opcua.endpoint, "opc.tcp://plc.local:4840");
        assert_eq!(config.opcua.user_token.username(), Some("operator"));
        assert_eq!(config.supervisor.poll_interval, Duration::from_millis(500));
        assert_eq!(config.supervisor.nodes.len(), 2);
        assert_eq!(config.supervisor.language, Language::De);
        assert_eq!(config.supervisor.retry.max_attempts, 4);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_json_str() {
        let json = r#"{
            "opcua": { "endpoint": "opc.tcp://10.0.0.5:4840" },
            "supervisor": { "nodes": ["ns=3;i=1001"] }
        }"#;
        let config = loader("UAWATCH_TEST_JSON")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.opcua.endpoint, "opc.tcp://10.0.0.5:4840");
        assert_eq!(config.supervisor.nodes[0].to_string(), "ns=3;i=1001");
    }

    #[test]
    fn test_scalar_attribute_defaults_to_value() {
        let loader = loader("UAWATCH_TEST_SCALAR");

        let config = loader
            .load_from_str(r#"{ "supervisor": {} }"#, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.supervisor.scalar_attribute.as_deref(), Some("value"));

        let config = loader
            .load_from_str(r#"{ "supervisor": { "scalar_attribute": null } }"#, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.supervisor.scalar_attribute, None);
    }

    #[test]
    fn test_invalid_node_id_fails_to_parse() {
        let json = r#"{ "supervisor": { "nodes": ["not a node"] } }"#;
        let result = loader("UAWATCH_TEST_BADNODE").load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Serialization { .. })));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let json = r#"{ "opcua": { "endpoint": "tcp://plc:4840" } }"#;
        let result = loader("UAWATCH_TEST_VALIDATE").load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Client(_))));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let result = ConfigLoader::new()
            .resolve_env_placeholders("endpoint: ${UAWATCH_TEST_SURELY_UNSET:opc.tcp://x:1}");
        assert_eq!(result, "endpoint: opc.tcp://x:1");
    }

    #[test]
    fn test_env_placeholder_missing_kept() {
        let result =
            ConfigLoader::new().resolve_env_placeholders("a: ${UAWATCH_TEST_ALSO_UNSET} ${open");
        assert_eq!(result, "a: ${UAWATCH_TEST_ALSO_UNSET} ${open");
    }

    #[test]
    fn test_env_placeholder_resolved() {
        env::set_var("UAWATCH_TEST_PLACEHOLDER_HOST", "plc-7");
        let result = ConfigLoader::new()
            .resolve_env_placeholders("opc.tcp://${UAWATCH_TEST_PLACEHOLDER_HOST:ignored}:4840");
        assert_eq!(result, "opc.tcp://plc-7:4840");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UAWATCH_TEST_OVR_ENDPOINT", "opc.tcp://override:4840");
        env::set_var("UAWATCH_TEST_OVR_USERNAME", "service");
        env::set_var("UAWATCH_TEST_OVR_POLL_INTERVAL_MS", "250");
        env::set_var("UAWATCH_TEST_OVR_LANGUAGE", "german");
        env::set_var("UAWATCH_TEST_OVR_LOG_LEVEL", "warning");

        let config = loader("UAWATCH_TEST_OVR")
            .load_from_str(TOML, ConfigFormat::Toml)
            .unwrap();

        assert_eq!(config.opcua.endpoint, "opc.tcp://override:4840");
        assert_eq!(
            config.opcua.user_token,
            UserTokenType::UserName {
                username: "service".to_string(),
                password: "secret".to_string(),
            }
        );
        assert_eq!(config.supervisor.poll_interval, Duration::from_millis(250));
        assert_eq!(config.supervisor.language, Language::De);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("UAWATCH_TEST_BADENV_POLL_INTERVAL_MS", "fast");
        let result = loader("UAWATCH_TEST_BADENV").load_from_str("{}", ConfigFormat::Json);
        match result {
            Err(ConfigError::InvalidEnvVar { name, .. }) => {
                assert_eq!(name, "UAWATCH_TEST_BADENV_POLL_INTERVAL_MS")
            }
            other => panic!("expected InvalidEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_env_disabled_ignores_overrides() {
        env::set_var("UAWATCH_TEST_OFF_ENDPOINT", "opc.tcp://ignored:4840");
        let config = ConfigLoader::builder()
            .env_prefix("UAWATCH_TEST_OFF")
            .resolve_env_vars(false)
            .build()
            .load_from_str(TOML, ConfigFormat::Toml)
            .unwrap();
        assert_eq!(config.opcua.endpoint, "opc.tcp://plc.local:4840");
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/uawatch.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();
        let result = loader("UAWATCH_TEST_PARSE").load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
