// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;
use uawatch_client::OpcUaError;

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Parse error in the configuration file.
    #[error("Failed to parse configuration file '{path}': {message}")]
    Parse {
        /// Path to the file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Validation error outside the client settings.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// I/O error while reading the configuration.
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file does not exist.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the file.
        path: PathBuf,
    },

    /// Environment override with an unusable value.
    #[error("Invalid value in environment variable '{name}': {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Unsupported file extension.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },

    /// Deserialization error before a path is known.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Client or supervisor settings rejected by their own validation.
    #[error(transparent)]
    Client(#[from] OpcUaError),
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns a short operator-facing message.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse { path, message } => {
                format!("Cannot parse {}: {}", path.display(), message)
            }
            ConfigError::Validation { field, message } => {
                format!("Invalid setting '{}': {}", field, message)
            }
            ConfigError::Io { path, .. } => format!("Cannot read {}", path.display()),
            ConfigError::FileNotFound { path } => {
                format!("Configuration file not found: {}", path.display())
            }
            ConfigError::InvalidEnvVar { name, message } => {
                format!("Invalid environment variable {}: {}", name, message)
            }
            ConfigError::UnsupportedFormat { format } => {
                format!("Unsupported configuration format: {}", format)
            }
            ConfigError::Serialization { message } => format!("Invalid configuration: {}", message),
            ConfigError::Client(e) => e.user_message(),
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ConfigError::Io { .. } | ConfigError::FileNotFound { .. })
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::Serialization { .. } => "serialization",
            ConfigError::Client(_) => "client",
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uawatch_client::ConfigurationError;

    #[test]
    fn test_error_type() {
        assert_eq!(ConfigError::validation("logging.level", "bad").error_type(), "validation");
        assert_eq!(ConfigError::unsupported_format("ini").error_type(), "unsupported_format");
        assert!(ConfigError::file_not_found("uawatch.yaml").is_io_error());
        assert!(!ConfigError::serialization("oops").is_io_error());
    }

    #[test]
    fn test_client_error_is_wrapped() {
        let inner = OpcUaError::configuration(ConfigurationError::invalid_value(
            "poll_interval",
            "must be greater than 0",
        ));
        let error: ConfigError = inner.into();
        assert_eq!(error.error_type(), "client");
        assert!(error.to_string().contains("poll_interval"));
    }
}
