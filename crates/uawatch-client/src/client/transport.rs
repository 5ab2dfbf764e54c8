// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The supervisor never talks to a protocol library directly. Everything it
//! needs from a session (connect, probe, resolve, read, write, subscribe)
//! goes through [`OpcUaTransport`], and change notifications come back
//! through a registered [`DataChangeHandler`]. This keeps the state machine
//! testable against a scripted transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OpcUaResult;
use crate::types::{NodeId, OpcUaConfig};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Transport is not connected.
    #[default]
    Disconnected,

    /// Transport is establishing a session.
    Connecting,

    /// Transport is connected and ready.
    Connected,

    /// Last connection attempt failed.
    Failed,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// ReadResult / WriteResult
// =============================================================================

/// Result of a node read operation.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The node ID that was read.
    pub node_id: NodeId,

    /// The value read (if successful).
    pub value: Option<OpcUaValue>,

    /// Status code of the read operation.
    pub status_code: u32,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl ReadResult {
    /// Creates a successful read result.
    pub fn success(node_id: NodeId, value: OpcUaValue) -> Self {
        Self {
            node_id,
            value: Some(value),
            status_code: 0,
            source_timestamp: Some(Utc::now()),
        }
    }

    /// Creates a failed read result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            value: None,
            status_code,
            source_timestamp: None,
        }
    }

    /// Returns `true` if the read was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x8000_0000 != 0
    }
}

/// Result of a node write operation.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// The node ID that was written.
    pub node_id: NodeId,

    /// Status code of the write operation.
    pub status_code: u32,
}

impl WriteResult {
    /// Creates a successful write result.
    pub fn success(node_id: NodeId) -> Self {
        Self {
            node_id,
            status_code: 0,
        }
    }

    /// Creates a failed write result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the write was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code == 0
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// Value exchanged with the transport.
///
/// `Structure` carries a custom data type already decoded into named
/// fields. `ExtensionObject` is a body the client could not decode.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTime<Utc>),
    /// GUID value.
    Guid(uuid::Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Array of values.
    Array(Vec<OpcUaValue>),
    /// Decoded custom structure.
    Structure(StructureValue),
    /// Encoded structure the client could not decode.
    ExtensionObject {
        /// Encoding type id as reported by the server.
        type_id: String,
        /// Raw body.
        body: Vec<u8>,
    },
    /// Null value.
    Null,
}

impl OpcUaValue {
    /// Returns a short name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::Array(_) => "Array",
            Self::Structure(_) => "Structure",
            Self::ExtensionObject { .. } => "ExtensionObject",
            Self::Null => "Null",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            Self::SByte(v) => Some(*v != 0),
            Self::Byte(v) => Some(*v != 0),
            Self::Int16(v) => Some(*v != 0),
            Self::UInt16(v) => Some(*v != 0),
            Self::Int32(v) => Some(*v != 0),
            Self::UInt32(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Boolean(v) => Some(i64::from(*v)),
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::UInt64(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the value as a structure.
    pub fn as_structure(&self) -> Option<&StructureValue> {
        match self {
            Self::Structure(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for OpcUaValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Structure(v) => write!(f, "{}{{{} fields}}", v.type_name, v.fields.len()),
            Self::ExtensionObject { type_id, body } => {
                write!(f, "<{} {} bytes>", type_id, body.len())
            }
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// StructureValue
// =============================================================================

/// A custom data type decoded into named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureValue {
    /// Data type name (for example `ST_AxisData`).
    pub type_name: String,

    /// Fields in declaration order.
    pub fields: Vec<StructureField>,
}

impl StructureValue {
    /// Creates an empty structure.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a decoded field.
    pub fn with_field(mut self, name: impl Into<String>, value: OpcUaValue) -> Self {
        self.fields.push(StructureField {
            name: name.into(),
            value: FieldValue::Decoded(value),
        });
        self
    }

    /// Appends a field the client could not decode.
    pub fn with_undecodable(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.fields.push(StructureField {
            name: name.into(),
            value: FieldValue::Undecodable {
                reason: reason.into(),
            },
        });
        self
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&StructureField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One named field of a [`StructureValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct StructureField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: FieldValue,
}

/// Decoding outcome of one structure field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Field decoded to a value.
    Decoded(OpcUaValue),
    /// Field body could not be decoded.
    Undecodable {
        /// Reason given by the decoder.
        reason: String,
    },
}

// =============================================================================
// Data change delivery
// =============================================================================

/// A change notification for one monitored node.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangeEvent {
    /// The node that changed.
    pub node_id: NodeId,

    /// The new value.
    pub value: OpcUaValue,

    /// Source timestamp reported by the server.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp reported by the server.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataChangeEvent {
    /// Creates an event without timestamps.
    pub fn new(node_id: NodeId, value: OpcUaValue) -> Self {
        Self {
            node_id,
            value,
            source_timestamp: None,
            server_timestamp: None,
        }
    }
}

/// Receiver of change notifications.
///
/// Called from the client library's delivery context. Implementations
/// must return quickly and must not perform blocking I/O.
pub trait DataChangeHandler: Send + Sync {
    /// Handles one change notification.
    fn on_data_change(&self, event: DataChangeEvent);
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Session-level operations the supervisor relies on.
///
/// Implementations are shared behind one `tokio::sync::Mutex`, which
/// serializes every call made on the session.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Opens and authenticates a session with the configured endpoint.
    async fn connect(&mut self) -> OpcUaResult<()>;

    /// Closes the session. Calling it while disconnected is a no-op.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` if a session is open.
    fn is_connected(&self) -> bool;

    /// Returns the transport state.
    fn state(&self) -> TransportState;

    /// Lightweight reachability probe that needs no subscription.
    ///
    /// Returns the endpoint URLs advertised by the server.
    async fn get_endpoints(&self) -> OpcUaResult<Vec<String>>;

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Verifies that a node exists and can be addressed.
    async fn resolve_node(&self, node_id: &NodeId) -> OpcUaResult<()>;

    /// Reads the value attribute of a node.
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult>;

    /// Writes the value attribute of a node.
    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Creates a subscription delivering notifications to `handler`.
    ///
    /// Returns the subscription ID.
    async fn create_subscription(
        &self,
        publishing_interval: Duration,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32>;

    /// Attaches a data-change monitored item for one node.
    ///
    /// Returns the monitored item ID.
    async fn subscribe_data_change(&self, subscription_id: u32, node_id: &NodeId)
        -> OpcUaResult<u32>;

    /// Removes one monitored item.
    async fn unsubscribe(&self, subscription_id: u32, monitored_item_id: u32) -> OpcUaResult<()>;

    /// Deletes a subscription together with whatever items it still has.
    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a display name for logs.
    fn display_name(&self) -> String;

    /// Returns the endpoint URL.
    fn endpoint(&self) -> &str;

    /// Returns the configuration.
    fn config(&self) -> &OpcUaConfig;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_result_status() {
        let node = NodeId::string(4, "OPCUA.bServerStatus");
        let ok = ReadResult::success(node.clone(), OpcUaValue::Boolean(true));
        assert!(ok.is_good());
        assert!(!ok.is_bad());

        let bad = ReadResult::failure(node, 0x8034_0000);
        assert!(bad.is_bad());
        assert!(bad.value.is_none());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(OpcUaValue::UInt32(1).as_bool(), Some(true));
        assert_eq!(OpcUaValue::Int16(-3).as_i64(), Some(-3));
        assert_eq!(OpcUaValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(OpcUaValue::String("x".into()).as_str(), Some("x"));
        assert_eq!(OpcUaValue::String("x".into()).as_bool(), None);
        assert!(OpcUaValue::default().is_null());
    }

    #[test]
    fn test_structure_builder() {
        let value = StructureValue::new("ST_Data")
            .with_field("myInt", OpcUaValue::Int16(7))
            .with_undecodable("blob", "truncated body");

        assert_eq!(value.fields.len(), 2);
        assert_eq!(
            value.field("myInt").map(|f| &f.value),
            Some(&FieldValue::Decoded(OpcUaValue::Int16(7)))
        );
        assert!(value.field("missing").is_none());
        assert_eq!(OpcUaValue::Structure(value).to_string(), "ST_Data{2 fields}");
    }
}
