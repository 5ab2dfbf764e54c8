// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawatch-config
//!
//! Configuration files for the uawatch supervisor.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML and JSON files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside the file
//! - **Environment Overrides**: `UAWATCH_*` variables for the settings that
//!   change per deployment
//!
//! ## Quick Start
//!
//! ```no_run
//! use uawatch_config::loader::load_config;
//!
//! let config = load_config("uawatch.yaml").unwrap();
//! println!("Endpoint: {}", config.opcua.endpoint);
//! println!("Nodes: {}", config.supervisor.nodes.len());
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! opcua:
//!   endpoint: "${PLC_ENDPOINT:opc.tcp://127.0.0.1:4840}"
//!   user_token:
//!     user_name:
//!       username: operator
//!       password: "${PLC_PASSWORD}"
//! supervisor:
//!   poll_interval: 1s
//!   status_node: "ns=2;s=Controller.Running"
//!   nodes: ["ns=2;s=Axis.X", "ns=2;s=Axis.Y"]
//!   language: de
//!   # Scalar notifications are cached under this name; null rejects them.
//!   scalar_attribute: value
//!   retry:
//!     max_attempts: 3
//!     initial_delay: 2s
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder,
    DEFAULT_ENV_PREFIX,
};
pub use schema::{AppConfig, LogFormat, LogLevel, LoggingConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Prelude
// =============================================================================

/// Convenience re-exports for common use cases.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::loader::{load_config, ConfigLoader};
    pub use crate::schema::{AppConfig, LoggingConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "uawatch-config");
    }

    #[test]
    fn test_prelude_imports() {
        use prelude::*;
        assert!(AppConfig::default().validate().is_ok());
    }
}
