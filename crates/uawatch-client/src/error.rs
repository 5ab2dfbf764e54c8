// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the supervisor, transport seam, cache decoding and write path.
//!
//! Every failure the supervisor can observe is classified into one of the
//! categories below so that it can be logged at the right level, routed to
//! the right outbound stream and, where it makes sense, retried.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint, session and reachability failures
//! ├── Operation     - Read/write rejected by the server
//! ├── Subscription  - Subscription and monitored item failures
//! ├── Conversion    - Command values that cannot be encoded
//! ├── Decode        - Notification payloads that cannot be folded into the cache
//! ├── Configuration - Invalid settings
//! └── Supervisor    - Retry exhaustion, shutdown, contained panics
//! ```
//!
//! # Examples
//!
//! ```
//! use uawatch_client::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused("opc.tcp://localhost:4840"));
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "connection");
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type of this crate.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitored item errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Command value conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Notification payload decoding errors.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Supervisor lifecycle errors.
    #[error("{0}")]
    Supervisor(#[from] SupervisorError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(error: DecodeError) -> Self {
        Self::Decode(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a supervisor error.
    #[inline]
    pub fn supervisor(error: SupervisorError) -> Self {
        Self::Supervisor(error)
    }

    /// Creates a "not connected" error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a read failure.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write failure.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a later attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Subscription(e) => e.is_retryable(),
            Self::Conversion(_) | Self::Decode(_) | Self::Configuration(_) => false,
            Self::Supervisor(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Operation(_) => ErrorSeverity::Error,
            Self::Subscription(_) => ErrorSeverity::Warning,
            Self::Conversion(_) => ErrorSeverity::Error,
            Self::Decode(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Supervisor(e) => e.severity(),
        }
    }

    /// Returns the error category for logging and routing.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Conversion(_) => "conversion",
            Self::Decode(_) => "decode",
            Self::Configuration(_) => "configuration",
            Self::Supervisor(_) => "supervisor",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Decode(e) => e.error_code(),
            Self::Configuration(_) => ErrorCode::new(6, 1),
            Self::Supervisor(e) => e.error_code(),
        }
    }

    /// Returns a short operator-facing description.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(ConnectionError::NotConnected) => {
                "Not connected to the OPC UA server".to_string()
            }
            Self::Connection(ConnectionError::AuthenticationFailed { username }) => {
                format!("Login rejected for user '{}'", username)
            }
            Self::Connection(_) => "The OPC UA server cannot be reached".to_string(),
            Self::Operation(OperationError::WriteFailed { node_id, .. })
            | Self::Operation(OperationError::BadStatus { node_id, .. }) => {
                format!("The server rejected the request for node {}", node_id)
            }
            Self::Operation(e) => e.to_string(),
            Self::Subscription(e) => e.to_string(),
            Self::Conversion(e) => format!("Invalid value: {}", e),
            Self::Decode(e) => e.to_string(),
            Self::Configuration(e) => format!("Invalid configuration: {}", e),
            Self::Supervisor(e) => e.to_string(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused or session could not be opened.
    #[error("Connection refused to '{endpoint}': {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Reason reported by the client library.
        reason: String,
    },

    /// Authentication rejected by the server.
    #[error("Authentication failed for user '{username}'")]
    AuthenticationFailed {
        /// The user that was rejected.
        username: String,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}': {reason}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Status reported by the client.
        reason: String,
    },

    /// Reachability probe failed on an open session.
    #[error("Server at '{endpoint}' is not reachable: {reason}")]
    Unreachable {
        /// Target endpoint.
        endpoint: String,
        /// Probe failure.
        reason: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connection refused error without a detailed reason.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: "connection refused".to_string(),
        }
    }

    /// Creates a connection refused error with a reason.
    pub fn refused_with(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timed_out(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unreachable error.
    pub fn unreachable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::TimedOut { .. } | Self::Unreachable { .. } | Self::NotConnected
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AuthenticationFailed { .. } | Self::InvalidEndpoint { .. } => {
                ErrorSeverity::Critical
            }
            Self::NotConnected => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Refused { .. } => 1,
            Self::AuthenticationFailed { .. } => 2,
            Self::TimedOut { .. } => 3,
            Self::Unreachable { .. } => 4,
            Self::InvalidEndpoint { .. } => 5,
            Self::NotConnected => 6,
        };
        ErrorCode::new(1, code)
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read/write operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Write failed.
    #[error("Write failed for node '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Bad status code returned by the server.
    #[error("Bad status code {status_code:#010x} for node '{node_id}'")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// OPC UA status code.
        status_code: u32,
    },

    /// Node could not be resolved on the server.
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// Node ID.
        node_id: String,
    },
}

impl OperationError {
    /// Creates a read failure.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Creates a node-not-found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadFailed { .. } | Self::WriteFailed { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::ReadFailed { .. } => 1,
            Self::WriteFailed { .. } => 2,
            Self::BadStatus { .. } => 3,
            Self::NodeNotFound { .. } => 4,
        };
        ErrorCode::new(2, code)
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// Subscription not found.
    #[error("Subscription not found: {subscription_id}")]
    NotFound {
        /// Subscription ID.
        subscription_id: u32,
    },

    /// Monitored item creation failed.
    #[error("Failed to create monitored item for node '{node_id}': {message}")]
    MonitoredItemFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Monitored item removal failed.
    #[error("Failed to remove monitored item {item_id}: {message}")]
    UnsubscribeFailed {
        /// Monitored item ID.
        item_id: u32,
        /// Error message.
        message: String,
    },

    /// A subscription is already active.
    #[error("Subscription {subscription_id} is already active")]
    AlreadyActive {
        /// The live subscription.
        subscription_id: u32,
    },
}

impl SubscriptionError {
    /// Creates a creation failure.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// Creates a monitored item failure.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates an unsubscribe failure.
    pub fn unsubscribe_failed(item_id: u32, message: impl Into<String>) -> Self {
        Self::UnsubscribeFailed {
            item_id,
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CreationFailed { .. } | Self::MonitoredItemFailed { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::CreationFailed { .. } => 1,
            Self::NotFound { .. } => 2,
            Self::MonitoredItemFailed { .. } => 3,
            Self::UnsubscribeFailed { .. } => 4,
            Self::AlreadyActive { .. } => 5,
        };
        ErrorCode::new(3, code)
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Errors raised while encoding a command value for the wire.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Value type has no command encoding.
    #[error("Unsupported value type for write: {value_type}")]
    UnsupportedType {
        /// Name of the rejected type.
        value_type: String,
    },

    /// Value does not fit the wire type.
    #[error("Value {value} is out of range for {target_type}")]
    OutOfRange {
        /// The offending value.
        value: String,
        /// Wire type.
        target_type: &'static str,
    },

    /// Text could not be parsed as a number.
    #[error("Cannot convert '{input}' to a floating point number")]
    InvalidNumber {
        /// The rejected input.
        input: String,
    },

    /// Structure update named fields the structure does not have.
    #[error("Unknown fields for '{type_name}': {}", fields.join(", "))]
    UnknownFields {
        /// Structure type.
        type_name: String,
        /// Field names that were rejected.
        fields: Vec<String>,
    },
}

impl ConversionError {
    /// Creates an unsupported type error.
    pub fn unsupported_type(value_type: impl Into<String>) -> Self {
        Self::UnsupportedType {
            value_type: value_type.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::UnsupportedType { .. } => 1,
            Self::OutOfRange { .. } => 2,
            Self::InvalidNumber { .. } => 3,
            Self::UnknownFields { .. } => 4,
        };
        ErrorCode::new(4, code)
    }
}

// =============================================================================
// DecodeError
// =============================================================================

/// Errors raised while folding a notification payload into the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload shape has no decoding strategy.
    #[error("Unrecognized payload shape '{shape}' for node '{node_id}'")]
    UnrecognizedShape {
        /// Node the event was delivered for.
        node_id: String,
        /// Shape name.
        shape: String,
    },

    /// A single field of a structure could not be decoded.
    #[error("Cannot decode field '{field}' of node '{node_id}': {reason}")]
    Field {
        /// Node the event was delivered for.
        node_id: String,
        /// Field name (may be empty if the name itself was malformed).
        field: String,
        /// Reason.
        reason: String,
    },
}

impl DecodeError {
    /// Creates an unrecognized shape error.
    pub fn unrecognized_shape(node_id: impl Into<String>, shape: impl Into<String>) -> Self {
        Self::UnrecognizedShape {
            node_id: node_id.into(),
            shape: shape.into(),
        }
    }

    /// Creates a field decode error.
    pub fn field(
        node_id: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Field {
            node_id: node_id.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnrecognizedShape { .. } => ErrorCode::new(5, 1),
            Self::Field { .. } => ErrorCode::new(5, 2),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Missing required field.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Invalid node ID.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The node ID.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Invalid endpoint.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint.
        endpoint: String,
        /// Reason.
        reason: String,
    },

    /// Invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// SupervisorError
// =============================================================================

/// Errors about the supervisor itself rather than a single operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Every connect attempt in the retry budget failed.
    #[error("Gave up connecting after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Message of the last failure.
        last_error: String,
    },

    /// Operation interrupted because shutdown started.
    #[error("Supervisor is shutting down")]
    ShuttingDown,

    /// A panic was caught at the iteration boundary.
    #[error("Supervisor iteration panicked: {message}")]
    IterationPanicked {
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl SupervisorError {
    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RetriesExhausted { .. } => ErrorSeverity::Critical,
            Self::ShuttingDown => ErrorSeverity::Info,
            Self::IterationPanicked { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::RetriesExhausted { .. } => 1,
            Self::ShuttingDown => 2,
            Self::IterationPanicked { .. } => 3,
        };
        ErrorCode::new(7, code)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Operation
/// - 3: Subscription
/// - 4: Conversion
/// - 5: Decode
/// - 6: Configuration
/// - 7: Supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-7).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result type alias for this crate.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_classification() {
        let err = OpcUaError::not_connected();
        assert_eq!(err.category(), "connection");
        assert_eq!(err.to_string(), "Not connected to OPC UA server");
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_error_code_format() {
        let err = OpcUaError::decode(DecodeError::unrecognized_shape("ns=4;s=X", "scalar"));
        assert_eq!(err.error_code().to_string(), "UA-0501");

        let err = OpcUaError::supervisor(SupervisorError::RetriesExhausted {
            attempts: 3,
            last_error: "refused".into(),
        });
        assert_eq!(err.error_code().to_string(), "UA-0701");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_conversion_not_retryable() {
        let err = OpcUaError::conversion(ConversionError::unsupported_type("DateTime"));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("DateTime"));
    }

    #[test]
    fn test_unknown_fields_message() {
        let err = ConversionError::UnknownFields {
            type_name: "ST_Axis".into(),
            fields: vec!["speed".into(), "accel".into()],
        };
        assert_eq!(err.to_string(), "Unknown fields for 'ST_Axis': speed, accel");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), Level::WARN);
    }
}
