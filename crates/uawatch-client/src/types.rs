// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node identifiers and static configuration.
//!
//! - **NodeId**: the four OPC UA identifier kinds with text parsing
//! - **OpcUaConfig**: endpoint, identity and session settings
//! - **SupervisorConfig**: poll cadence, monitored nodes, retry policy
//!
//! Configuration is read once at startup and never altered while the
//! supervisor runs.
//!
//! # Examples
//!
//! ```
//! use uawatch_client::types::{NodeId, SupervisorConfig};
//!
//! let node: NodeId = "ns=4;s=MAIN.myVar1".parse().unwrap();
//! assert_eq!(node.namespace_index, 4);
//!
//! let config = SupervisorConfig::builder()
//!     .node("ns=4;s=MAIN.myVar1")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.nodes.len(), 1);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};
use crate::retry::RetryPolicy;
use crate::status::Language;

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// Serialized in its text form (`ns=4;s=MAIN.myVar1`), which is also the
/// key used by the value cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Returns the OPC UA text form.
    ///
    /// Namespace 0 is omitted, matching what servers print.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=1001` / `s=MyNode` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".into()))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".into()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".into()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid("Empty string identifier".into()));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".into(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

impl TryFrom<String> for NodeId {
    type Error = OpcUaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.to_opc_string()
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier (TwinCAT symbols use this form).
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// UserTokenType
// =============================================================================

/// How the client authenticates to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenType {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username and password authentication.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
}

impl UserTokenType {
    /// Returns the user name, if any.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::UserName { username, .. } => Some(username),
        }
    }
}

impl fmt::Display for UserTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
        }
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Server-side subscription parameters other than the publishing interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Lifetime count (in publishing intervals).
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Keep-alive count (in publishing intervals).
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish response (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Relative priority.
    #[serde(default)]
    pub priority: u8,
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
        }
    }
}

// =============================================================================
// OpcUaConfig
// =============================================================================

/// Connection settings for the OPC UA session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// Server endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// User authentication token.
    #[serde(default = "default_user_token")]
    pub user_token: UserTokenType,

    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Session timeout requested from the server.
    #[serde(default = "default_session_timeout")]
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Subscription parameters.
    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

fn default_endpoint() -> String {
    "opc.tcp://localhost:4840".to_string()
}

fn default_user_token() -> UserTokenType {
    UserTokenType::UserName {
        username: "admin1".to_string(),
        password: "admin1".to_string(),
    }
}

fn default_application_name() -> String {
    "uawatch".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

impl OpcUaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OpcUaConfigBuilder {
        OpcUaConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.endpoint.is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "endpoint",
            )));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_endpoint(
                    &self.endpoint,
                    "Endpoint must start with opc.tcp://",
                ),
            ));
        }

        if let UserTokenType::UserName { username, .. } = &self.user_token {
            if username.is_empty() {
                return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                    "user_token.username",
                )));
            }
        }

        if self.session_timeout.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "session_timeout",
                "must be greater than 0",
            )));
        }

        Ok(())
    }
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_token: default_user_token(),
            application_name: default_application_name(),
            session_timeout: default_session_timeout(),
            subscription: SubscriptionSettings::default(),
        }
    }
}

/// Builder for [`OpcUaConfig`].
#[derive(Debug, Default)]
pub struct OpcUaConfigBuilder {
    config: Option<OpcUaConfig>,
}

impl OpcUaConfigBuilder {
    fn config_mut(&mut self) -> &mut OpcUaConfig {
        self.config.get_or_insert_with(OpcUaConfig::default)
    }

    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config_mut().endpoint = endpoint.into();
        self
    }

    /// Uses username/password authentication.
    pub fn username(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config_mut().user_token = UserTokenType::UserName {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Uses anonymous authentication.
    pub fn anonymous(mut self) -> Self {
        self.config_mut().user_token = UserTokenType::Anonymous;
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config_mut().application_name = name.into();
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config_mut().session_timeout = timeout;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(mut self) -> OpcUaResult<OpcUaConfig> {
        let config = self.config.take().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// SupervisorConfig
// =============================================================================

/// Settings of the connection supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Pause between two health evaluations.
    #[serde(default = "default_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Boolean node reporting whether the controller is in run mode.
    #[serde(default = "default_status_node")]
    pub status_node: NodeId,

    /// Nodes monitored while the controller is healthy.
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeId>,

    /// Publishing interval of the single subscription.
    #[serde(default = "default_publishing_interval")]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Reconnection schedule.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Time the push-button node is held high by a pulse.
    #[serde(default = "default_pulse_width")]
    #[serde(with = "humantime_serde")]
    pub pulse_width: Duration,

    /// Language of operator-facing status text.
    #[serde(default)]
    pub language: Language,

    /// Attribute name under which scalar notifications are cached.
    ///
    /// Defaults to `"value"`. When set to `null`, scalar payloads are
    /// rejected as an unrecognized shape.
    #[serde(default = "default_scalar_attribute")]
    pub scalar_attribute: Option<String>,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_status_node() -> NodeId {
    NodeId::string(4, "OPCUA.bServerStatus")
}

fn default_nodes() -> Vec<NodeId> {
    vec![NodeId::string(4, "MAIN.myVar1"), NodeId::string(4, "MAIN.myVar2")]
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_pulse_width() -> Duration {
    Duration::from_millis(100)
}

fn default_scalar_attribute() -> Option<String> {
    Some("value".to_string())
}

impl SupervisorConfig {
    /// Creates a new configuration builder starting from the defaults.
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.poll_interval.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "poll_interval",
                "must be greater than 0",
            )));
        }

        if self.publishing_interval.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "publishing_interval",
                "must be greater than 0",
            )));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].contains(node) {
                return Err(OpcUaError::configuration(
                    ConfigurationError::invalid_node_id(node.to_string(), "listed twice"),
                ));
            }
        }

        if let Some(name) = &self.scalar_attribute {
            if name.trim().is_empty() {
                return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                    "scalar_attribute",
                    "must not be empty",
                )));
            }
        }

        self.retry.validate()
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            status_node: default_status_node(),
            nodes: default_nodes(),
            publishing_interval: default_publishing_interval(),
            retry: RetryPolicy::default(),
            pulse_width: default_pulse_width(),
            language: Language::default(),
            scalar_attribute: default_scalar_attribute(),
        }
    }
}

/// Builder for [`SupervisorConfig`].
///
/// Node strings are parsed in [`build`](Self::build) so that a typo is
/// reported together with the rest of the validation.
#[derive(Debug, Default)]
pub struct SupervisorConfigBuilder {
    poll_interval: Option<Duration>,
    status_node: Option<String>,
    nodes: Vec<String>,
    publishing_interval: Option<Duration>,
    retry: Option<RetryPolicy>,
    pulse_width: Option<Duration>,
    language: Option<Language>,
    scalar_attribute: Option<String>,
}

impl SupervisorConfigBuilder {
    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the controller status node.
    pub fn status_node(mut self, node: impl Into<String>) -> Self {
        self.status_node = Some(node.into());
        self
    }

    /// Adds a monitored node. The first call replaces the default list.
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Sets the publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.publishing_interval = Some(interval);
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the push-button pulse width.
    pub fn pulse_width(mut self, width: Duration) -> Self {
        self.pulse_width = Some(width);
        self
    }

    /// Sets the status text language.
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Caches scalar payloads under the given attribute name.
    pub fn scalar_attribute(mut self, name: impl Into<String>) -> Self {
        self.scalar_attribute = Some(name.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcUaResult<SupervisorConfig> {
        let mut config = SupervisorConfig::default();

        if let Some(v) = self.poll_interval {
            config.poll_interval = v;
        }
        if let Some(v) = self.status_node {
            config.status_node = v.parse()?;
        }
        if !self.nodes.is_empty() {
            config.nodes = self
                .nodes
                .iter()
                .map(|n| n.parse())
                .collect::<OpcUaResult<Vec<NodeId>>>()?;
        }
        if let Some(v) = self.publishing_interval {
            config.publishing_interval = v;
        }
        if let Some(v) = self.retry {
            config.retry = v;
        }
        if let Some(v) = self.pulse_width {
            config.pulse_width = v;
        }
        if let Some(v) = self.language {
            config.language = v;
        }
        if let Some(v) = self.scalar_attribute {
            config.scalar_attribute = Some(v);
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
