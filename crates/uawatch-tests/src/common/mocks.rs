// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Transport
//!
//! An in-memory OPC UA server for driving the supervisor without a network.
//!
//! [`MockTransport`] is handed to the supervisor. The paired
//! [`MockController`] stays with the test and scripts the server: take it
//! off the network, stop the controller, reject monitored items, push data
//! changes. Every call is counted so tests can assert on what the
//! supervisor did.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use uawatch_client::{
    ConnectionError, DataChangeEvent, DataChangeHandler, NodeId, OpcUaConfig, OpcUaError,
    OpcUaResult, OpcUaTransport, OpcUaValue, ReadResult, SubscriptionError, TransportState,
    WriteResult,
};

/// `BadNodeIdUnknown`.
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;

/// `BadUserAccessDenied`.
pub const BAD_USER_ACCESS_DENIED: u32 = 0x801F_0000;

// =============================================================================
// Scripted Behavior
// =============================================================================

/// How connect attempts behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Connects whenever the server is reachable.
    Accept,
    /// Refuses the next `n` attempts, then accepts.
    RefuseTimes(u32),
    /// Refuses every attempt.
    RefuseAlways,
    /// Rejects the login. Not retryable.
    RejectLogin,
}

#[derive(Debug)]
struct Script {
    reachable: bool,
    controller_running: bool,
    connect: ConnectBehavior,
    failing_nodes: HashSet<NodeId>,
    fail_unsubscribe: bool,
    fail_create_subscription: u32,
    write_status: u32,
    panic_next_probe: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reachable: true,
            controller_running: true,
            connect: ConnectBehavior::Accept,
            failing_nodes: HashSet::new(),
            fail_unsubscribe: false,
            fail_create_subscription: 0,
            write_status: 0,
            panic_next_probe: false,
        }
    }
}

#[derive(Default)]
struct Session {
    connected: bool,
    handler: Option<Arc<dyn DataChangeHandler>>,
    subscription_id: Option<u32>,
    items: HashMap<u32, NodeId>,
    values: HashMap<NodeId, OpcUaValue>,
    connect_times: Vec<Instant>,
    writes: Vec<(NodeId, OpcUaValue)>,
}

/// Call counters.
#[derive(Debug, Default)]
pub struct MockCounters {
    /// `connect` calls, successful or not.
    pub connects: AtomicU64,
    /// `disconnect` calls.
    pub disconnects: AtomicU64,
    /// Reachability probes.
    pub probes: AtomicU64,
    /// `read_value` calls.
    pub reads: AtomicU64,
    /// `write_value` calls.
    pub writes: AtomicU64,
    /// `create_subscription` calls.
    pub subscriptions_created: AtomicU64,
    /// `delete_subscription` calls.
    pub subscriptions_deleted: AtomicU64,
    /// `subscribe_data_change` calls.
    pub items_requested: AtomicU64,
    /// `unsubscribe` calls.
    pub unsubscribes: AtomicU64,
}

impl MockCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

struct Shared {
    script: Mutex<Script>,
    session: Mutex<Session>,
    counters: MockCounters,
    next_id: AtomicU32,
    status_node: NodeId,
}

impl Shared {
    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// In-memory transport scripted through a [`MockController`].
pub struct MockTransport {
    config: OpcUaConfig,
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Creates a transport whose controller flag lives at `status_node`.
    pub fn new(status_node: NodeId) -> (Self, MockController) {
        let shared = Arc::new(Shared {
            script: Mutex::new(Script::default()),
            session: Mutex::new(Session::default()),
            counters: MockCounters::default(),
            next_id: AtomicU32::new(1),
            status_node,
        });

        let transport = Self {
            config: OpcUaConfig {
                endpoint: "opc.tcp://mock-plc:4840".to_string(),
                ..OpcUaConfig::default()
            },
            shared: Arc::clone(&shared),
        };

        (transport, MockController { shared })
    }

    fn require_session(&self) -> OpcUaResult<()> {
        if self.shared.session.lock().connected {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }

    fn endpoint_text(&self) -> String {
        self.config.endpoint.clone()
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&mut self) -> OpcUaResult<()> {
        MockCounters::bump(&self.shared.counters.connects);
        self.shared.session.lock().connect_times.push(Instant::now());

        let outcome = {
            let mut script = self.shared.script.lock();
            if !script.reachable {
                Err(ConnectionError::refused_with(self.endpoint_text(), "host unreachable"))
            } else {
                let behavior = script.connect;
                match behavior {
                    ConnectBehavior::Accept => Ok(()),
                    ConnectBehavior::RefuseTimes(0) => {
                        script.connect = ConnectBehavior::Accept;
                        Ok(())
                    }
                    ConnectBehavior::RefuseTimes(n) => {
                        script.connect = if n == 1 {
                            ConnectBehavior::Accept
                        } else {
                            ConnectBehavior::RefuseTimes(n - 1)
                        };
                        Err(ConnectionError::refused(self.endpoint_text()))
                    }
                    ConnectBehavior::RefuseAlways => {
                        Err(ConnectionError::refused(self.endpoint_text()))
                    }
                    ConnectBehavior::RejectLogin => Err(ConnectionError::AuthenticationFailed {
                        username: "operator".to_string(),
                    }),
                }
            }
        };

        outcome.map_err(OpcUaError::connection)?;
        self.shared.session.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        MockCounters::bump(&self.shared.counters.disconnects);
        let mut session = self.shared.session.lock();
        session.connected = false;
        session.handler = None;
        session.subscription_id = None;
        session.items.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.session.lock().connected
    }

    fn state(&self) -> TransportState {
        if self.is_connected() {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    async fn get_endpoints(&self) -> OpcUaResult<Vec<String>> {
        MockCounters::bump(&self.shared.counters.probes);

        let (reachable, panic_now) = {
            let mut script = self.shared.script.lock();
            let panic_now = std::mem::take(&mut script.panic_next_probe);
            (script.reachable, panic_now)
        };

        if panic_now {
            panic!("simulated fault in reachability probe");
        }

        if reachable {
            Ok(vec![self.endpoint_text()])
        } else {
            Err(OpcUaError::connection(ConnectionError::unreachable(
                self.endpoint_text(),
                "no route to host",
            )))
        }
    }

    async fn resolve_node(&self, _node_id: &NodeId) -> OpcUaResult<()> {
        self.require_session()
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        MockCounters::bump(&self.shared.counters.reads);
        self.require_session()?;

        if *node_id == self.shared.status_node {
            let running = self.shared.script.lock().controller_running;
            return Ok(ReadResult::success(node_id.clone(), OpcUaValue::Boolean(running)));
        }

        let value = self.shared.session.lock().values.get(node_id).cloned();
        Ok(match value {
            Some(value) => ReadResult::success(node_id.clone(), value),
            None => ReadResult::failure(node_id.clone(), BAD_NODE_ID_UNKNOWN),
        })
    }

    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult> {
        MockCounters::bump(&self.shared.counters.writes);
        self.require_session()?;

        let status = self.shared.script.lock().write_status;
        let mut session = self.shared.session.lock();
        session.writes.push((node_id.clone(), value.clone()));

        if status != 0 {
            return Ok(WriteResult::failure(node_id.clone(), status));
        }
        session.values.insert(node_id.clone(), value);
        Ok(WriteResult::success(node_id.clone()))
    }

    async fn create_subscription(
        &self,
        _publishing_interval: Duration,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32> {
        self.require_session()?;
        {
            let mut script = self.shared.script.lock();
            if script.fail_create_subscription > 0 {
                script.fail_create_subscription -= 1;
                return Err(OpcUaError::subscription(SubscriptionError::creation_failed(
                    "BadTooManySubscriptions",
                )));
            }
        }
        MockCounters::bump(&self.shared.counters.subscriptions_created);

        let id = self.shared.next_id();
        let mut session = self.shared.session.lock();
        session.handler = Some(handler);
        session.subscription_id = Some(id);
        Ok(id)
    }

    async fn subscribe_data_change(&self, subscription_id: u32, node_id: &NodeId) -> OpcUaResult<u32> {
        MockCounters::bump(&self.shared.counters.items_requested);
        self.require_session()?;

        if self.shared.script.lock().failing_nodes.contains(node_id) {
            return Err(OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                node_id.to_string(),
                "BadNodeIdUnknown",
            )));
        }

        let mut session = self.shared.session.lock();
        if session.subscription_id != Some(subscription_id) {
            return Err(OpcUaError::subscription(SubscriptionError::not_found(
                subscription_id,
            )));
        }

        let item_id = self.shared.next_id();
        session.items.insert(item_id, node_id.clone());
        Ok(item_id)
    }

    async fn unsubscribe(&self, _subscription_id: u32, monitored_item_id: u32) -> OpcUaResult<()> {
        MockCounters::bump(&self.shared.counters.unsubscribes);

        if self.shared.script.lock().fail_unsubscribe {
            return Err(OpcUaError::subscription(SubscriptionError::unsubscribe_failed(
                monitored_item_id,
                "BadMonitoredItemIdInvalid",
            )));
        }

        self.shared.session.lock().items.remove(&monitored_item_id);
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        MockCounters::bump(&self.shared.counters.subscriptions_deleted);

        let mut session = self.shared.session.lock();
        if session.subscription_id == Some(subscription_id) {
            session.subscription_id = None;
            session.handler = None;
            session.items.clear();
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        format!("MockTransport({})", self.config.endpoint)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn config(&self) -> &OpcUaConfig {
        &self.config
    }
}

// =============================================================================
// MockController
// =============================================================================

/// Test-side handle that scripts and inspects a [`MockTransport`].
#[derive(Clone)]
pub struct MockController {
    shared: Arc<Shared>,
}

impl MockController {
    // =========================================================================
    // Scripting
    // =========================================================================

    /// Takes the server on or off the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.script.lock().reachable = reachable;
    }

    /// Switches the controller between run mode and config mode.
    pub fn set_controller_running(&self, running: bool) {
        self.shared.script.lock().controller_running = running;
    }

    /// Sets how connect attempts behave.
    pub fn set_connect(&self, behavior: ConnectBehavior) {
        self.shared.script.lock().connect = behavior;
    }

    /// Makes monitored item creation fail for `node`.
    pub fn fail_node(&self, node: NodeId) {
        self.shared.script.lock().failing_nodes.insert(node);
    }

    /// Makes every monitored item removal fail.
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.shared.script.lock().fail_unsubscribe = fail;
    }

    /// Makes the next `times` subscription creations fail.
    pub fn fail_create_subscription(&self, times: u32) {
        self.shared.script.lock().fail_create_subscription = times;
    }

    /// Status code returned for every write. `0` is good.
    pub fn set_write_status(&self, status: u32) {
        self.shared.script.lock().write_status = status;
    }

    /// Panics inside the next reachability probe.
    pub fn panic_next_probe(&self) {
        self.shared.script.lock().panic_next_probe = true;
    }

    /// Delivers a data change for `node` to the subscription handler.
    ///
    /// Returns `false` if no live monitored item covers `node`.
    pub fn emit(&self, node: &NodeId, value: OpcUaValue) -> bool {
        let handler = {
            let session = self.shared.session.lock();
            if !session.items.values().any(|n| n == node) {
                return false;
            }
            session.handler.clone()
        };

        match handler {
            Some(handler) => {
                handler.on_data_change(DataChangeEvent::new(node.clone(), value));
                true
            }
            None => false,
        }
    }

    /// Delivers a data change through the handler even without a monitored
    /// item, as a late notification racing teardown would.
    pub fn emit_stale(&self, handler: &Arc<dyn DataChangeHandler>, node: &NodeId, value: OpcUaValue) {
        handler.on_data_change(DataChangeEvent::new(node.clone(), value));
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the call counters.
    pub fn counters(&self) -> &MockCounters {
        &self.shared.counters
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u64 {
        MockCounters::get(&self.shared.counters.connects)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u64 {
        MockCounters::get(&self.shared.counters.disconnects)
    }

    /// Number of write calls that reached the transport.
    pub fn write_count(&self) -> u64 {
        MockCounters::get(&self.shared.counters.writes)
    }

    /// Number of subscriptions created.
    pub fn subscriptions_created(&self) -> u64 {
        MockCounters::get(&self.shared.counters.subscriptions_created)
    }

    /// Number of subscriptions deleted.
    pub fn subscriptions_deleted(&self) -> u64 {
        MockCounters::get(&self.shared.counters.subscriptions_deleted)
    }

    /// Returns `true` while a session is open.
    pub fn is_connected(&self) -> bool {
        self.shared.session.lock().connected
    }

    /// Nodes with a live monitored item.
    pub fn monitored_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.shared.session.lock().items.values().cloned().collect();
        nodes.sort_by_key(|n| n.to_string());
        nodes
    }

    /// Returns the subscription handler, if a subscription exists.
    pub fn handler(&self) -> Option<Arc<dyn DataChangeHandler>> {
        self.shared.session.lock().handler.clone()
    }

    /// Instants at which connect was attempted.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.shared.session.lock().connect_times.clone()
    }

    /// Waits between consecutive connect attempts.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        self.connect_times()
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    /// Every write that reached the transport, in order.
    pub fn write_history(&self) -> Vec<(NodeId, OpcUaValue)> {
        self.shared.session.lock().writes.clone()
    }

    /// Value stored on the server for `node`.
    pub fn server_value(&self, node: &NodeId) -> Option<OpcUaValue> {
        self.shared.session.lock().values.get(node).cloned()
    }
}

impl std::fmt::Debug for MockController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockController")
            .field("connected", &self.is_connected())
            .field("connects", &self.connect_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
