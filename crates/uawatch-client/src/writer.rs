// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command path from the display layer to the server.
//!
//! Writes go straight through the shared session lock and never through the
//! supervisor loop. A write while the supervisor is not connected fails at
//! once with a not-connected error; nothing is queued.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::client::{FieldValue, OpcUaTransport, OpcUaValue, StructureValue};
use crate::error::{ConversionError, OpcUaError, OpcUaResult, OperationError};
use crate::supervisor::ConnectionState;
use crate::types::NodeId;

// =============================================================================
// WriteValue
// =============================================================================

/// A value accepted by the write path.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    /// Boolean, written as Boolean.
    Boolean(bool),
    /// Integer, written as UInt32.
    Integer(i64),
    /// Floating point, written as Double.
    Float(f64),
    /// Text, written as String.
    Text(String),
}

impl WriteValue {
    /// Encodes the value with its default wire type.
    pub fn encode(&self) -> OpcUaResult<OpcUaValue> {
        Ok(match self {
            Self::Boolean(v) => OpcUaValue::Boolean(*v),
            Self::Integer(v) => OpcUaValue::UInt32(
                u32::try_from(*v).map_err(|_| out_of_range(*v, "UInt32"))?,
            ),
            Self::Float(v) => OpcUaValue::Double(*v),
            Self::Text(v) => OpcUaValue::String(v.clone()),
        })
    }

    /// Encodes the value with the wire type of `template`.
    ///
    /// Used for structure fields, which keep the type they already have.
    pub fn encode_as(&self, template: &OpcUaValue) -> OpcUaResult<OpcUaValue> {
        let encoded = match (self, template) {
            (Self::Boolean(v), OpcUaValue::Boolean(_)) => OpcUaValue::Boolean(*v),
            (Self::Integer(v), OpcUaValue::SByte(_)) => {
                OpcUaValue::SByte(i8::try_from(*v).map_err(|_| out_of_range(*v, "SByte"))?)
            }
            (Self::Integer(v), OpcUaValue::Byte(_)) => {
                OpcUaValue::Byte(u8::try_from(*v).map_err(|_| out_of_range(*v, "Byte"))?)
            }
            (Self::Integer(v), OpcUaValue::Int16(_)) => {
                OpcUaValue::Int16(i16::try_from(*v).map_err(|_| out_of_range(*v, "Int16"))?)
            }
            (Self::Integer(v), OpcUaValue::UInt16(_)) => {
                OpcUaValue::UInt16(u16::try_from(*v).map_err(|_| out_of_range(*v, "UInt16"))?)
            }
            (Self::Integer(v), OpcUaValue::Int32(_)) => {
                OpcUaValue::Int32(i32::try_from(*v).map_err(|_| out_of_range(*v, "Int32"))?)
            }
            (Self::Integer(v), OpcUaValue::UInt32(_)) => {
                OpcUaValue::UInt32(u32::try_from(*v).map_err(|_| out_of_range(*v, "UInt32"))?)
            }
            (Self::Integer(v), OpcUaValue::Int64(_)) => OpcUaValue::Int64(*v),
            (Self::Integer(v), OpcUaValue::UInt64(_)) => {
                OpcUaValue::UInt64(u64::try_from(*v).map_err(|_| out_of_range(*v, "UInt64"))?)
            }
            (Self::Integer(v), OpcUaValue::Float(_)) => OpcUaValue::Float(*v as f32),
            (Self::Integer(v), OpcUaValue::Double(_)) => OpcUaValue::Double(*v as f64),
            (Self::Float(v), OpcUaValue::Float(_)) => OpcUaValue::Float(*v as f32),
            (Self::Float(v), OpcUaValue::Double(_)) => OpcUaValue::Double(*v),
            (Self::Text(v), OpcUaValue::String(_)) => OpcUaValue::String(v.clone()),
            (value, template) => {
                return Err(OpcUaError::conversion(ConversionError::unsupported_type(
                    format!("{} into {}", value.type_name(), template.type_name()),
                )))
            }
        };
        Ok(encoded)
    }

    /// Returns the variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Text(_) => "Text",
        }
    }
}

fn out_of_range(value: i64, target_type: &'static str) -> OpcUaError {
    OpcUaError::conversion(ConversionError::OutOfRange {
        value: value.to_string(),
        target_type,
    })
}

impl fmt::Display for WriteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<bool> for WriteValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for WriteValue {
                fn from(v: $t) -> Self {
                    Self::Integer(i64::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for WriteValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for WriteValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for WriteValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for WriteValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl TryFrom<OpcUaValue> for WriteValue {
    type Error = OpcUaError;

    fn try_from(value: OpcUaValue) -> Result<Self, Self::Error> {
        match value {
            OpcUaValue::Boolean(v) => Ok(Self::Boolean(v)),
            OpcUaValue::SByte(v) => Ok(v.into()),
            OpcUaValue::Byte(v) => Ok(v.into()),
            OpcUaValue::Int16(v) => Ok(v.into()),
            OpcUaValue::UInt16(v) => Ok(v.into()),
            OpcUaValue::Int32(v) => Ok(v.into()),
            OpcUaValue::UInt32(v) => Ok(v.into()),
            OpcUaValue::Int64(v) => Ok(v.into()),
            OpcUaValue::UInt64(v) => i64::try_from(v).map(Self::Integer).map_err(|_| {
                OpcUaError::conversion(ConversionError::OutOfRange {
                    value: v.to_string(),
                    target_type: "Integer",
                })
            }),
            OpcUaValue::Float(v) => Ok(v.into()),
            OpcUaValue::Double(v) => Ok(v.into()),
            OpcUaValue::String(v) => Ok(v.into()),
            other => Err(OpcUaError::conversion(ConversionError::unsupported_type(
                other.type_name(),
            ))),
        }
    }
}

// =============================================================================
// Structure updates
// =============================================================================

/// Applies named field updates to a copy of `current`.
///
/// Every name must refer to a decoded field of `current`; otherwise the whole
/// update is rejected with [`ConversionError::UnknownFields`] listing the
/// offending names.
pub fn apply_field_updates<I, K, V>(current: &StructureValue, updates: I) -> OpcUaResult<StructureValue>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<WriteValue>,
{
    let mut updated = current.clone();
    let mut rejected = Vec::new();

    for (name, value) in updates {
        let name = name.into();
        let value = value.into();

        let slot = updated
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .and_then(|f| match &mut f.value {
                FieldValue::Decoded(v) => Some(v),
                FieldValue::Undecodable { .. } => None,
            });

        match slot {
            Some(existing) => {
                let encoded = value.encode_as(existing)?;
                *existing = encoded;
            }
            None => rejected.push(name),
        }
    }

    if !rejected.is_empty() {
        return Err(OpcUaError::conversion(ConversionError::UnknownFields {
            type_name: current.type_name.clone(),
            fields: rejected,
        }));
    }

    Ok(updated)
}

// =============================================================================
// ValueWriter
// =============================================================================

/// Write API handed to the display layer.
pub struct ValueWriter<T: OpcUaTransport> {
    transport: Arc<Mutex<T>>,
    state: watch::Receiver<ConnectionState>,
    pulse_width: Duration,
    cancel: CancellationToken,
}

impl<T: OpcUaTransport> Clone for ValueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            state: self.state.clone(),
            pulse_width: self.pulse_width,
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: OpcUaTransport> ValueWriter<T> {
    /// Creates a writer.
    pub fn new(
        transport: Arc<Mutex<T>>,
        state: watch::Receiver<ConnectionState>,
        pulse_width: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            state,
            pulse_width,
            cancel,
        }
    }

    /// Returns the pulse width.
    pub fn pulse_width(&self) -> Duration {
        self.pulse_width
    }

    /// Writes one value.
    pub async fn write_value(&self, node: &NodeId, value: impl Into<WriteValue>) -> OpcUaResult<()> {
        self.ensure_connected()?;
        let encoded = value.into().encode()?;
        self.write_raw(node, encoded).await
    }

    /// Writes `true`, holds it for the pulse width, then writes `false`.
    ///
    /// The reset is attempted even if shutdown cuts the wait short.
    pub async fn pulse(&self, node: &NodeId) -> OpcUaResult<()> {
        self.write_value(node, true).await?;

        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!(node_id = %node, "Pulse cut short by shutdown");
            }
            _ = tokio::time::sleep(self.pulse_width) => {}
        }

        self.write_raw(node, OpcUaValue::Boolean(false)).await
    }

    /// Parses `text` as a float, writes it to `axis`, then pulses `button`.
    pub async fn write_absolute(&self, axis: &NodeId, text: &str, button: &NodeId) -> OpcUaResult<()> {
        let value: f64 = text.trim().parse().map_err(|_| {
            OpcUaError::conversion(ConversionError::InvalidNumber {
                input: text.to_string(),
            })
        })?;

        self.write_value(axis, value).await?;
        self.pulse(button).await
    }

    /// Writes a copy of `current` with the named fields replaced.
    ///
    /// Unknown or undecodable field names reject the whole write before any
    /// network call.
    pub async fn write_fields<I, K, V>(
        &self,
        node: &NodeId,
        current: &StructureValue,
        updates: I,
    ) -> OpcUaResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<WriteValue>,
    {
        let updated = apply_field_updates(current, updates)?;
        self.ensure_connected()?;
        self.write_raw(node, OpcUaValue::Structure(updated)).await
    }

    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.state.borrow().is_connected() {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }

    async fn write_raw(&self, node: &NodeId, value: OpcUaValue) -> OpcUaResult<()> {
        self.ensure_connected()?;

        tracing::debug!(node_id = %node, value = %value, "Writing value");

        let transport = self.transport.lock().await;
        let result = transport.write_value(node, value).await?;
        drop(transport);

        if result.is_good() {
            Ok(())
        } else {
            let error = OpcUaError::operation(OperationError::bad_status(
                node.to_string(),
                result.status_code,
            ));
            error.log("write");
            Err(error)
        }
    }
}

impl<T: OpcUaTransport> fmt::Debug for ValueWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueWriter")
            .field("state", &*self.state.borrow())
            .field("pulse_width", &self.pulse_width)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_encoding() {
        assert_eq!(WriteValue::from(true).encode().unwrap(), OpcUaValue::Boolean(true));
        assert_eq!(WriteValue::from(100).encode().unwrap(), OpcUaValue::UInt32(100));
        assert_eq!(WriteValue::from(2.5).encode().unwrap(), OpcUaValue::Double(2.5));
        assert_eq!(
            WriteValue::from("abc").encode().unwrap(),
            OpcUaValue::String("abc".into())
        );
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = WriteValue::Integer(-1).encode().unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Conversion(ConversionError::OutOfRange { target_type: "UInt32", .. })
        ));
        assert!(WriteValue::Integer(i64::from(u32::MAX) + 1).encode().is_err());
    }

    #[test]
    fn test_try_from_rejects_unsupported() {
        assert!(WriteValue::try_from(OpcUaValue::Null).is_err());
        assert!(WriteValue::try_from(OpcUaValue::ByteString(vec![1])).is_err());
        assert_eq!(
            WriteValue::try_from(OpcUaValue::Int16(-3)).unwrap(),
            WriteValue::Integer(-3)
        );
    }

    #[test]
    fn test_encode_as_keeps_field_type() {
        assert_eq!(
            WriteValue::Integer(7).encode_as(&OpcUaValue::Int16(0)).unwrap(),
            OpcUaValue::Int16(7)
        );
        assert_eq!(
            WriteValue::Integer(3).encode_as(&OpcUaValue::Double(0.0)).unwrap(),
            OpcUaValue::Double(3.0)
        );
        assert!(WriteValue::Integer(70_000)
            .encode_as(&OpcUaValue::Int16(0))
            .is_err());
        assert!(WriteValue::Text("x".into())
            .encode_as(&OpcUaValue::Boolean(false))
            .is_err());
    }

    #[test]
    fn test_field_updates() {
        let current = StructureValue::new("ST_Axis")
            .with_field("position", OpcUaValue::Double(0.0))
            .with_field("enabled", OpcUaValue::Boolean(false));

        let updated =
            apply_field_updates(&current, [("position", WriteValue::from(12.5))]).unwrap();

        assert_eq!(
            updated.field("position").map(|f| &f.value),
            Some(&FieldValue::Decoded(OpcUaValue::Double(12.5)))
        );
        assert_eq!(
            updated.field("enabled").map(|f| &f.value),
            Some(&FieldValue::Decoded(OpcUaValue::Boolean(false)))
        );
    }

    #[test]
    fn test_unknown_fields_reject_whole_update() {
        let current = StructureValue::new("ST_Axis")
            .with_field("position", OpcUaValue::Double(0.0))
            .with_undecodable("raw", "unknown encoding");

        let err = apply_field_updates(
            &current,
            [
                ("position", WriteValue::from(1.0)),
                ("speed", WriteValue::from(2.0)),
                ("raw", WriteValue::from(3.0)),
            ],
        )
        .unwrap_err();

        match err {
            OpcUaError::Conversion(ConversionError::UnknownFields { type_name, fields }) => {
                assert_eq!(type_name, "ST_Axis");
                assert_eq!(fields, vec!["speed".to_string(), "raw".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
