// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! [`OpcUaTransport`] on top of the `opcua` crate.
//!
//! The `opcua` 0.12 client API is blocking, so every session call runs on
//! the blocking thread pool through [`tokio::task::spawn_blocking`].
//!
//! Publish responses, and with them every data change callback, are only
//! processed while the session loop runs. [`RealOpcUaTransport::connect`]
//! starts that loop with [`Session::run_async`] and
//! [`RealOpcUaTransport::disconnect`] stops it.
//!
//! Only the `None` security policy is used. Identity is anonymous or
//! user name and password.
//!
//! # Example
//!
//! ```rust,ignore
//! use uawatch_client::client::RealOpcUaTransport;
//! use uawatch_client::types::OpcUaConfig;
//!
//! let config = OpcUaConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()?;
//!
//! let mut transport = RealOpcUaTransport::new(config);
//! transport.connect().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;
use tokio::sync::oneshot;

use crate::client::transport::{
    DataChangeEvent, DataChangeHandler, OpcUaTransport, OpcUaValue, ReadResult, TransportState,
    WriteResult,
};
use crate::error::{
    ConnectionError, ConversionError, OpcUaError, OpcUaResult, OperationError, SubscriptionError,
};
use crate::types::{NodeId, NodeIdentifier, OpcUaConfig, UserTokenType};

type SharedSession = Arc<OpcUaRwLock<Session>>;
type SessionLoop = oneshot::Sender<SessionCommand>;

const BAD_NO_RESULT: u32 = 0x8000_0000;

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport backed by an `opcua` client session.
pub struct RealOpcUaTransport {
    config: OpcUaConfig,
    state: RwLock<TransportState>,
    session: RwLock<Option<SharedSession>>,
    /// Stops the session loop when sent to or dropped.
    session_loop: RwLock<Option<SessionLoop>>,
    /// Monitored items per subscription, keyed by server item ID.
    subscriptions: RwLock<HashMap<u32, HashMap<u32, NodeId>>>,
}

impl RealOpcUaTransport {
    /// Creates a disconnected transport.
    pub fn new(config: OpcUaConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TransportState::Disconnected),
            session: RwLock::new(None),
            session_loop: RwLock::new(None),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    fn build_client(&self) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(self.config.application_name.as_str())
            .application_uri(format!("urn:{}", self.config.application_name))
            .session_retry_limit(0)
            .session_timeout(self.config.session_timeout.as_millis() as u32)
            .trust_server_certs(true)
            .create_sample_keypair(false)
            .client()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::invalid_endpoint(
                    &self.config.endpoint,
                    "Failed to build OPC UA client",
                ))
            })
    }

    fn identity_token(&self) -> IdentityToken {
        match &self.config.user_token {
            UserTokenType::Anonymous => IdentityToken::Anonymous,
            UserTokenType::UserName { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
        }
    }

    fn session(&self) -> OpcUaResult<SharedSession> {
        self.session.read().clone().ok_or_else(OpcUaError::not_connected)
    }

    fn set_state(&self, state: TransportState) {
        *self.state.write() = state;
    }

    /// Returns `true` while the session loop is running.
    pub fn is_session_loop_running(&self) -> bool {
        self.session_loop.read().is_some()
    }

    fn stop_session_loop(&self) {
        if let Some(stop) = self.session_loop.write().take() {
            // The loop may already have ended on its own.
            let _ = stop.send(SessionCommand::Stop);
            debug!(endpoint = %self.config.endpoint, "Session loop stopped");
        }
    }

    /// Runs a blocking session call off the async worker threads.
    async fn blocking<F, R>(f: F) -> OpcUaResult<R>
    where
        F: FnOnce() -> OpcUaResult<R> + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(f).await.map_err(|e| {
            OpcUaError::operation(OperationError::read_failed(
                "session",
                format!("Blocking task failed: {}", e),
            ))
        })?
    }

    async fn read_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: AttributeId,
    ) -> OpcUaResult<ReadResult> {
        let session = self.session()?;
        let ours = node_id.clone();
        let request = ReadValueId {
            node_id: to_opcua_node_id(node_id),
            attribute_id: attribute_id as u32,
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        };

        trace!(node_id = %node_id, attribute = ?attribute_id, "Reading node attribute");

        Self::blocking(move || {
            let values = session
                .read()
                .read(&[request], TimestampsToReturn::Both, 0.0)
                .map_err(|e| {
                    OpcUaError::operation(OperationError::read_failed(
                        ours.to_string(),
                        e.to_string(),
                    ))
                })?;

            let Some(data_value) = values.first() else {
                return Ok(ReadResult::failure(ours, BAD_NO_RESULT));
            };

            let status_code = data_value.status.as_ref().map(|s| s.bits()).unwrap_or(0);
            match &data_value.value {
                Some(variant) if status_code & 0x8000_0000 == 0 => {
                    let mut result = ReadResult::success(ours, from_opcua_variant(variant));
                    result.status_code = status_code;
                    result.source_timestamp = data_value.source_timestamp.as_ref().map(to_chrono);
                    Ok(result)
                }
                _ => Ok(ReadResult::failure(ours, status_code)),
            }
        })
        .await
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self) -> OpcUaResult<()> {
        self.set_state(TransportState::Connecting);
        info!(endpoint = %self.config.endpoint, "Connecting to OPC UA server");

        let mut client = self.build_client()?;
        let endpoint_url = self.config.endpoint.clone();
        let identity = self.identity_token();
        let username = self.config.user_token.username().map(str::to_string);

        let result = Self::blocking(move || {
            let endpoints = client
                .get_server_endpoints_from_url(endpoint_url.as_str())
                .map_err(|status| discovery_error(&endpoint_url, status))?;

            let endpoint = endpoints
                .into_iter()
                .find(|e| {
                    e.security_policy_uri.as_ref() == SecurityPolicy::None.to_uri()
                        && e.security_mode == MessageSecurityMode::None
                })
                .ok_or_else(|| {
                    OpcUaError::connection(ConnectionError::refused_with(
                        &endpoint_url,
                        "server offers no endpoint without security",
                    ))
                })?;

            client
                .connect_to_endpoint(endpoint, identity)
                .map_err(|status| connect_error(&endpoint_url, username.as_deref(), status))
        })
        .await;

        match result {
            Ok(session) => {
                self.stop_session_loop();
                *self.session_loop.write() = Some(Session::run_async(Arc::clone(&session)));
                *self.session.write() = Some(session);
                self.set_state(TransportState::Connected);
                info!(endpoint = %self.config.endpoint, "Connected to OPC UA server");
                Ok(())
            }
            Err(e) => {
                self.set_state(TransportState::Failed);
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.stop_session_loop();
        let session = self.session.write().take();
        self.subscriptions.write().clear();

        if let Some(session) = session {
            info!(endpoint = %self.config.endpoint, "Disconnecting from OPC UA server");
            Self::blocking(move || {
                session.read().disconnect();
                Ok(())
            })
            .await?;
        }

        self.set_state(TransportState::Disconnected);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }

    fn state(&self) -> TransportState {
        *self.state.read()
    }

    async fn get_endpoints(&self) -> OpcUaResult<Vec<String>> {
        let session = self.session()?;
        let endpoint = self.config.endpoint.clone();

        Self::blocking(move || {
            let endpoints = session.read().get_endpoints().map_err(|e| {
                OpcUaError::connection(ConnectionError::unreachable(endpoint, e.to_string()))
            })?;
            Ok(endpoints
                .iter()
                .map(|e| e.endpoint_url.as_ref().to_string())
                .collect())
        })
        .await
    }

    async fn resolve_node(&self, node_id: &NodeId) -> OpcUaResult<()> {
        let result = self.read_attribute(node_id, AttributeId::NodeClass).await?;
        if result.is_good() {
            debug!(node_id = %node_id, "Node resolved");
            Ok(())
        } else {
            Err(OpcUaError::operation(OperationError::node_not_found(
                node_id.to_string(),
            )))
        }
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        self.read_attribute(node_id, AttributeId::Value).await
    }

    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult> {
        let session = self.session()?;
        let request = write_request(node_id, &value)?;
        let ours = node_id.clone();

        trace!(node_id = %node_id, value = %value, "Writing node value");

        Self::blocking(move || {
            let results = session.read().write(&[request]).map_err(|e| {
                OpcUaError::operation(OperationError::write_failed(
                    ours.to_string(),
                    e.to_string(),
                ))
            })?;

            Ok(match results.first() {
                Some(status) if status.is_good() => WriteResult::success(ours),
                Some(status) => WriteResult::failure(ours, status.bits()),
                None => WriteResult::failure(ours, BAD_NO_RESULT),
            })
        })
        .await
    }

    async fn create_subscription(
        &self,
        publishing_interval: Duration,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32> {
        let session = self.session()?;
        let settings = self.config.subscription.clone();

        trace!(interval = ?publishing_interval, "Creating subscription");

        let subscription_id = Self::blocking(move || {
            let callback = DataChangeCallback::new(move |items| {
                for item in items {
                    let node_id = from_opcua_node_id(&item.item_to_monitor().node_id);
                    let data_value = item.last_value();
                    let value = data_value
                        .value
                        .as_ref()
                        .map(from_opcua_variant)
                        .unwrap_or(OpcUaValue::Null);

                    let mut event = DataChangeEvent::new(node_id, value);
                    event.source_timestamp = data_value.source_timestamp.as_ref().map(to_chrono);
                    event.server_timestamp = data_value.server_timestamp.as_ref().map(to_chrono);
                    handler.on_data_change(event);
                }
            });

            session
                .read()
                .create_subscription(
                    publishing_interval.as_millis() as f64,
                    settings.lifetime_count,
                    settings.keepalive_count,
                    settings.max_notifications_per_publish,
                    settings.priority,
                    true,
                    callback,
                )
                .map_err(|e| {
                    OpcUaError::subscription(SubscriptionError::creation_failed(e.to_string()))
                })
        })
        .await?;

        self.subscriptions.write().insert(subscription_id, HashMap::new());
        info!(subscription_id = subscription_id, "Created subscription");
        Ok(subscription_id)
    }

    async fn subscribe_data_change(
        &self,
        subscription_id: u32,
        node_id: &NodeId,
    ) -> OpcUaResult<u32> {
        if !self.subscriptions.read().contains_key(&subscription_id) {
            return Err(OpcUaError::subscription(SubscriptionError::not_found(
                subscription_id,
            )));
        }

        let session = self.session()?;
        let node_text = node_id.to_string();
        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: to_opcua_node_id(node_id),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: 0,
                sampling_interval: -1.0,
                filter: ExtensionObject::null(),
                queue_size: 1,
                discard_oldest: true,
            },
        };

        let item_id = Self::blocking(move || {
            let results = session
                .read()
                .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[request])
                .map_err(|e| {
                    OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                        &node_text,
                        e.to_string(),
                    ))
                })?;

            match results.first() {
                Some(r) if r.status_code.is_good() => Ok(r.monitored_item_id),
                Some(r) => Err(OpcUaError::subscription(
                    SubscriptionError::monitored_item_failed(&node_text, r.status_code.to_string()),
                )),
                None => Err(OpcUaError::subscription(
                    SubscriptionError::monitored_item_failed(&node_text, "no result returned"),
                )),
            }
        })
        .await?;

        if let Some(items) = self.subscriptions.write().get_mut(&subscription_id) {
            items.insert(item_id, node_id.clone());
        }
        Ok(item_id)
    }

    async fn unsubscribe(&self, subscription_id: u32, monitored_item_id: u32) -> OpcUaResult<()> {
        let session = self.session()?;

        Self::blocking(move || {
            let results = session
                .read()
                .delete_monitored_items(subscription_id, &[monitored_item_id])
                .map_err(|e| {
                    OpcUaError::subscription(SubscriptionError::unsubscribe_failed(
                        monitored_item_id,
                        e.to_string(),
                    ))
                })?;

            match results.first() {
                Some(status) if !status.is_good() => Err(OpcUaError::subscription(
                    SubscriptionError::unsubscribe_failed(monitored_item_id, status.to_string()),
                )),
                _ => Ok(()),
            }
        })
        .await?;

        if let Some(items) = self.subscriptions.write().get_mut(&subscription_id) {
            items.remove(&monitored_item_id);
        }
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.session()?;

        Self::blocking(move || {
            session
                .read()
                .delete_subscription(subscription_id)
                .map(|_| ())
                .map_err(|e| {
                    warn!(subscription_id = subscription_id, error = %e, "Delete subscription failed");
                    OpcUaError::subscription(SubscriptionError::not_found(subscription_id))
                })
        })
        .await?;

        self.subscriptions.write().remove(&subscription_id);
        info!(subscription_id = subscription_id, "Deleted subscription");
        Ok(())
    }

    fn display_name(&self) -> String {
        format!("RealOpcUaTransport({})", self.config.endpoint)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn config(&self) -> &OpcUaConfig {
        &self.config
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => {
            opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v))
        }
        NodeIdentifier::Opaque(v) => {
            opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
        }
    }
}

fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        opcua::types::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
        opcua::types::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
        opcua::types::Identifier::Guid(v) => {
            NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes()))
        }
        opcua::types::Identifier::ByteString(v) => {
            NodeId::opaque(ns, v.value.clone().unwrap_or_default())
        }
    }
}

fn to_chrono(t: &opcua::types::DateTime) -> chrono::DateTime<chrono::Utc> {
    let c = t.as_chrono();
    chrono::DateTime::from_timestamp(c.timestamp(), c.timestamp_subsec_nanos())
        .unwrap_or_else(chrono::Utc::now)
}

fn from_opcua_variant(variant: &Variant) -> OpcUaValue {
    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => OpcUaValue::DateTime(to_chrono(v)),
        Variant::Guid(v) => OpcUaValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::ExtensionObject(obj) => {
            let body = match &obj.body {
                ExtensionObjectEncoding::ByteString(bytes) => bytes.value.clone().unwrap_or_default(),
                ExtensionObjectEncoding::XmlElement(xml) => xml.as_ref().as_bytes().to_vec(),
                ExtensionObjectEncoding::None => Vec::new(),
            };
            OpcUaValue::ExtensionObject {
                type_id: obj.node_id.to_string(),
                body,
            }
        }
        Variant::Array(arr) => {
            OpcUaValue::Array(arr.values.iter().map(from_opcua_variant).collect())
        }
        other => OpcUaValue::String(format!("{:?}", other)),
    }
}

fn to_opcua_variant(value: &OpcUaValue) -> OpcUaResult<Variant> {
    let variant = match value {
        OpcUaValue::Null => Variant::Empty,
        OpcUaValue::Boolean(v) => Variant::Boolean(*v),
        OpcUaValue::SByte(v) => Variant::SByte(*v),
        OpcUaValue::Byte(v) => Variant::Byte(*v),
        OpcUaValue::Int16(v) => Variant::Int16(*v),
        OpcUaValue::UInt16(v) => Variant::UInt16(*v),
        OpcUaValue::Int32(v) => Variant::Int32(*v),
        OpcUaValue::UInt32(v) => Variant::UInt32(*v),
        OpcUaValue::Int64(v) => Variant::Int64(*v),
        OpcUaValue::UInt64(v) => Variant::UInt64(*v),
        OpcUaValue::Float(v) => Variant::Float(*v),
        OpcUaValue::Double(v) => Variant::Double(*v),
        OpcUaValue::String(v) => Variant::String(UAString::from(v.as_str())),
        OpcUaValue::DateTime(v) => Variant::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        OpcUaValue::Guid(v) => Variant::Guid(Box::new(opcua::types::Guid::from(*v))),
        OpcUaValue::ByteString(v) => {
            Variant::ByteString(opcua::types::ByteString::from(v.as_slice()))
        }
        OpcUaValue::ExtensionObject { type_id, body } => {
            let node_id = type_id.parse::<opcua::types::NodeId>().map_err(|_| {
                OpcUaError::conversion(ConversionError::unsupported_type(format!(
                    "ExtensionObject({})",
                    type_id
                )))
            })?;
            Variant::ExtensionObject(Box::new(ExtensionObject {
                node_id,
                body: ExtensionObjectEncoding::ByteString(opcua::types::ByteString::from(
                    body.as_slice(),
                )),
            }))
        }
        // Custom structures and arrays need type dictionaries this client does not load.
        OpcUaValue::Array(_) | OpcUaValue::Structure(_) => {
            return Err(OpcUaError::conversion(ConversionError::unsupported_type(
                value.type_name(),
            )))
        }
    };
    Ok(variant)
}

// =============================================================================
// Requests and Errors
// =============================================================================

/// Builds a value write without timestamps.
///
/// TwinCAT servers answer timestamped value writes with
/// `BadWriteNotSupported`.
fn write_request(node_id: &NodeId, value: &OpcUaValue) -> OpcUaResult<WriteValue> {
    Ok(WriteValue {
        node_id: to_opcua_node_id(node_id),
        attribute_id: AttributeId::Value as u32,
        index_range: UAString::null(),
        value: DataValue::value_only(to_opcua_variant(value)?),
    })
}

fn is_timeout(status: opcua::types::StatusCode) -> bool {
    matches!(
        status,
        opcua::types::StatusCode::BadTimeout | opcua::types::StatusCode::BadRequestTimeout
    )
}

fn discovery_error(endpoint: &str, status: opcua::types::StatusCode) -> OpcUaError {
    if is_timeout(status) {
        OpcUaError::connection(ConnectionError::timed_out(endpoint, status.to_string()))
    } else {
        OpcUaError::connection(ConnectionError::unreachable(endpoint, status.to_string()))
    }
}

fn connect_error(
    endpoint: &str,
    username: Option<&str>,
    status: opcua::types::StatusCode,
) -> OpcUaError {
    let error = match status {
        opcua::types::StatusCode::BadUserAccessDenied
        | opcua::types::StatusCode::BadIdentityTokenRejected
        | opcua::types::StatusCode::BadIdentityTokenInvalid => {
            ConnectionError::AuthenticationFailed {
                username: username.unwrap_or_default().to_string(),
            }
        }
        status if is_timeout(status) => ConnectionError::timed_out(endpoint, status.to_string()),
        other => ConnectionError::refused_with(endpoint, other.to_string()),
    };
    OpcUaError::connection(error)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StructureValue;

    #[test]
    fn test_node_id_conversion() {
        let node = NodeId::string(4, "MAIN.myVar1");
        assert_eq!(from_opcua_node_id(&to_opcua_node_id(&node)), node);

        let node = NodeId::numeric(0, 2259);
        assert_eq!(from_opcua_node_id(&to_opcua_node_id(&node)), node);
    }

    #[test]
    fn test_value_conversion() {
        for value in [
            OpcUaValue::Boolean(true),
            OpcUaValue::UInt32(100),
            OpcUaValue::Double(3.5),
            OpcUaValue::String("Hello".into()),
        ] {
            let variant = to_opcua_variant(&value).unwrap();
            assert_eq!(from_opcua_variant(&variant), value);
        }
    }

    #[test]
    fn test_structure_write_rejected() {
        let value = OpcUaValue::Structure(StructureValue::new("ST_Axis"));
        assert!(to_opcua_variant(&value).is_err());
    }

    #[test]
    fn test_write_request_has_no_timestamps() {
        let node = NodeId::string(4, "MAIN.bMoveAbsolute");
        let request = write_request(&node, &OpcUaValue::Boolean(true)).unwrap();

        assert_eq!(request.value.value, Some(Variant::Boolean(true)));
        assert!(request.value.source_timestamp.is_none());
        assert!(request.value.server_timestamp.is_none());
        assert_eq!(request.attribute_id, AttributeId::Value as u32);
    }

    #[test]
    fn test_connect_error_mapping() {
        let endpoint = "opc.tcp://plc:4840";

        let err = connect_error(endpoint, Some("admin1"), opcua::types::StatusCode::BadUserAccessDenied);
        assert!(matches!(
            err,
            OpcUaError::Connection(ConnectionError::AuthenticationFailed { ref username }) if username == "admin1"
        ));

        let err = connect_error(endpoint, None, opcua::types::StatusCode::BadTimeout);
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::TimedOut { .. })));

        let err = discovery_error(endpoint, opcua::types::StatusCode::BadRequestTimeout);
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::TimedOut { .. })));

        let err = discovery_error(endpoint, opcua::types::StatusCode::BadCommunicationError);
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::Unreachable { .. })));

        let err = connect_error(endpoint, None, opcua::types::StatusCode::BadCommunicationError);
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::Refused { .. })));
    }

    #[tokio::test]
    async fn test_disconnect_stops_session_loop() {
        let config = OpcUaConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();
        let mut transport = RealOpcUaTransport::new(config);
        assert!(!transport.is_session_loop_running());

        let (stop, mut commands) = oneshot::channel();
        *transport.session_loop.write() = Some(stop);
        assert!(transport.is_session_loop_running());

        transport.disconnect().await.unwrap();

        assert!(!transport.is_session_loop_running());
        assert!(matches!(commands.try_recv(), Ok(SessionCommand::Stop)));
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[test]
    fn test_transport_starts_disconnected() {
        let config = OpcUaConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        let transport = RealOpcUaTransport::new(config);
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
    }
}
