// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Folding of change notifications into the [`ValueCache`].
//!
//! Every payload is classified into a [`PayloadShape`] first, and each shape
//! has exactly one strategy:
//!
//! | Shape       | Strategy                                              |
//! |-------------|-------------------------------------------------------|
//! | `Structure` | upsert every decodable field under its own name       |
//! | `Scalar`    | upsert under the configured scalar attribute, if any  |
//! | `Array`     | same as `Scalar`                                      |
//! | `Opaque`    | report, cache untouched                               |
//! | `Null`      | report, cache untouched                               |
//!
//! A bad field never blocks its siblings: the decodable fields of a
//! structure are committed and the rest are reported.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::ValueCache;
use crate::client::{DataChangeEvent, DataChangeHandler, FieldValue, OpcUaValue};
use crate::error::{DecodeError, OpcUaError};
use crate::status::{Message, StatusChannel};

// =============================================================================
// PayloadShape
// =============================================================================

/// Classification of a notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    /// Decoded custom structure.
    Structure,
    /// Single primitive value.
    Scalar,
    /// Array of values.
    Array,
    /// Encoded body the client could not decode.
    Opaque,
    /// No value.
    Null,
}

impl PayloadShape {
    /// Classifies a value.
    pub fn of(value: &OpcUaValue) -> Self {
        match value {
            OpcUaValue::Structure(_) => Self::Structure,
            OpcUaValue::Array(_) => Self::Array,
            OpcUaValue::ExtensionObject { .. } => Self::Opaque,
            OpcUaValue::Null => Self::Null,
            _ => Self::Scalar,
        }
    }

    /// Returns the shape name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Opaque => "opaque",
            Self::Null => "null",
        }
    }
}

/// Result of folding one notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOutcome {
    /// Attributes written to the cache.
    pub committed: usize,
    /// Problems found while decoding.
    pub errors: Vec<DecodeError>,
}

impl IngestOutcome {
    /// Returns `true` if nothing went wrong.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// NotificationSink
// =============================================================================

/// The [`DataChangeHandler`] that writes into the shared cache.
///
/// Decode problems are reported on the error stream and logged. After
/// [`close`](Self::close) every notification is dropped so that a late
/// delivery cannot repopulate the cache during shutdown.
pub struct NotificationSink {
    cache: Arc<ValueCache>,
    status: Arc<StatusChannel>,
    scalar_attribute: Option<String>,
    closed: AtomicBool,
    stats: SinkStats,
}

impl NotificationSink {
    /// Creates a sink.
    pub fn new(
        cache: Arc<ValueCache>,
        status: Arc<StatusChannel>,
        scalar_attribute: Option<String>,
    ) -> Self {
        Self {
            cache,
            status,
            scalar_attribute,
            closed: AtomicBool::new(false),
            stats: SinkStats::default(),
        }
    }

    /// Returns the cache this sink writes into.
    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    /// Stops accepting notifications.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns sink counters.
    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    /// Folds one notification into the cache without reporting.
    pub fn ingest(&self, event: &DataChangeEvent) -> IngestOutcome {
        let node = &event.node_id;
        let shape = PayloadShape::of(&event.value);
        let mut outcome = IngestOutcome::default();

        match (&event.value, shape) {
            (OpcUaValue::Structure(structure), _) => {
                for field in &structure.fields {
                    if field.name.trim().is_empty() {
                        outcome.errors.push(DecodeError::field(
                            node.to_opc_string(),
                            "",
                            "field name is empty",
                        ));
                        continue;
                    }
                    match &field.value {
                        FieldValue::Decoded(value) => {
                            self.cache.upsert(node, &field.name, value.clone());
                            outcome.committed += 1;
                        }
                        FieldValue::Undecodable { reason } => {
                            outcome.errors.push(DecodeError::field(
                                node.to_opc_string(),
                                field.name.clone(),
                                reason.clone(),
                            ));
                        }
                    }
                }
            }
            (value, PayloadShape::Scalar | PayloadShape::Array) => match &self.scalar_attribute {
                Some(attribute) => {
                    self.cache.upsert(node, attribute, value.clone());
                    outcome.committed += 1;
                }
                None => outcome.errors.push(DecodeError::unrecognized_shape(
                    node.to_opc_string(),
                    shape.as_str(),
                )),
            },
            _ => outcome.errors.push(DecodeError::unrecognized_shape(
                node.to_opc_string(),
                shape.as_str(),
            )),
        }

        outcome
    }
}

impl DataChangeHandler for NotificationSink {
    fn on_data_change(&self, event: DataChangeEvent) {
        if self.is_closed() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let outcome = self.ingest(&event);

        tracing::trace!(
            node_id = %event.node_id,
            committed = outcome.committed,
            errors = outcome.errors.len(),
            "Notification folded into cache"
        );

        for error in outcome.errors {
            self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
            let text = error.to_string();
            let error = OpcUaError::decode(error);
            error.log("notification");
            self.status
                .report(&error, Message::DecodeFailed { error: &text });
        }
    }
}

impl std::fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSink")
            .field("scalar_attribute", &self.scalar_attribute)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Counters for the sink.
#[derive(Debug, Default)]
pub struct SinkStats {
    received: AtomicU64,
    dropped: AtomicU64,
    decode_errors: AtomicU64,
}

impl SinkStats {
    /// Notifications processed.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Notifications dropped after close.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Decode problems reported.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StructureValue;
    use crate::types::NodeId;

    fn sink(scalar: Option<&str>) -> (NotificationSink, Arc<ValueCache>, Arc<StatusChannel>) {
        let cache = Arc::new(ValueCache::new());
        let status = Arc::new(StatusChannel::default());
        let sink = NotificationSink::new(
            Arc::clone(&cache),
            Arc::clone(&status),
            scalar.map(String::from),
        );
        (sink, cache, status)
    }

    fn node() -> NodeId {
        NodeId::string(4, "MAIN.myVar1")
    }

    #[test]
    fn test_shape_classification() {
        assert_eq!(PayloadShape::of(&OpcUaValue::Int32(1)), PayloadShape::Scalar);
        assert_eq!(PayloadShape::of(&OpcUaValue::Array(vec![])), PayloadShape::Array);
        assert_eq!(PayloadShape::of(&OpcUaValue::Null), PayloadShape::Null);
        assert_eq!(
            PayloadShape::of(&OpcUaValue::Structure(StructureValue::new("ST"))),
            PayloadShape::Structure
        );
        assert_eq!(
            PayloadShape::of(&OpcUaValue::ExtensionObject {
                type_id: "ns=4;i=5001".into(),
                body: vec![1, 2],
            }),
            PayloadShape::Opaque
        );
    }

    #[test]
    fn test_structure_fields_committed() {
        let (sink, cache, _) = sink(None);
        let value = StructureValue::new("ST_Data")
            .with_field("myInt", OpcUaValue::Int16(7))
            .with_field("myReal", OpcUaValue::Double(1.5));

        sink.on_data_change(DataChangeEvent::new(node(), OpcUaValue::Structure(value)));

        assert_eq!(cache.get(&node(), "myInt"), Some(OpcUaValue::Int16(7)));
        assert_eq!(cache.get(&node(), "myReal"), Some(OpcUaValue::Double(1.5)));
        assert_eq!(sink.stats().received(), 1);
        assert_eq!(sink.stats().decode_errors(), 0);
    }

    #[tokio::test]
    async fn test_bad_field_does_not_block_siblings() {
        let (sink, cache, status) = sink(None);
        let mut errors = status.subscribe_errors();
        let value = StructureValue::new("ST_Data")
            .with_field("a", OpcUaValue::Int32(1))
            .with_undecodable("b", "truncated body")
            .with_field("c", OpcUaValue::Int32(3));

        sink.on_data_change(DataChangeEvent::new(node(), OpcUaValue::Structure(value)));

        assert_eq!(cache.get(&node(), "a"), Some(OpcUaValue::Int32(1)));
        assert_eq!(cache.get(&node(), "c"), Some(OpcUaValue::Int32(3)));
        assert!(cache.get(&node(), "b").is_none());

        let event = errors.recv().await.unwrap();
        assert_eq!(event.category, "decode");
        assert!(event.message.contains("truncated body"));
        assert!(errors.try_recv().is_err());
    }

    #[test]
    fn test_empty_field_name_reported() {
        let (sink, cache, _) = sink(None);
        let value = StructureValue::new("ST").with_field(" ", OpcUaValue::Boolean(true));

        let outcome = sink.ingest(&DataChangeEvent::new(node(), OpcUaValue::Structure(value)));

        assert_eq!(outcome.committed, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scalar_without_attribute_rejected() {
        let (sink, cache, _) = sink(None);
        let outcome = sink.ingest(&DataChangeEvent::new(node(), OpcUaValue::Boolean(true)));

        assert_eq!(
            outcome.errors,
            vec![DecodeError::unrecognized_shape("ns=4;s=MAIN.myVar1", "scalar")]
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scalar_with_attribute() {
        let (sink, cache, _) = sink(Some("value"));
        sink.on_data_change(DataChangeEvent::new(node(), OpcUaValue::Double(2.5)));

        assert_eq!(cache.get(&node(), "value"), Some(OpcUaValue::Double(2.5)));
    }

    #[test]
    fn test_opaque_payload_leaves_cache_untouched() {
        let (sink, cache, _) = sink(Some("value"));
        let outcome = sink.ingest(&DataChangeEvent::new(
            node(),
            OpcUaValue::ExtensionObject {
                type_id: "ns=4;i=5001".into(),
                body: vec![0xde, 0xad],
            },
        ));

        assert!(!outcome.is_clean());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_closed_sink_drops_events() {
        let (sink, cache, _) = sink(Some("value"));
        sink.close();
        sink.on_data_change(DataChangeEvent::new(node(), OpcUaValue::Int32(1)));

        assert!(cache.is_empty());
        assert_eq!(sink.stats().dropped(), 1);
        assert_eq!(sink.stats().received(), 0);
    }
}
