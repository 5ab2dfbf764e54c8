// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The connection supervisor.
//!
//! A single background task owns the session and the [`ConnectionState`].
//! Each iteration it (re)connects if needed, probes reachability and
//! controller health, and on a change of the combined status drives the
//! subscription lifecycle and emits one status event.
//!
//! # State Machine
//!
//! ```text
//!                   connect ok                 controller running
//!  ┌──────────────┐ ─────────▶ ┌─────────────────────┐ ─────────▶ ┌──────────────────┐
//!  │ Disconnected │            │ ConnectedServerOnly │            │ ConnectedHealthy │
//!  └──────────────┘ ◀───────── └─────────────────────┘ ◀───────── └──────────────────┘
//!         │          unreachable          ▲              config mode        │
//!         │                               └─────────── unreachable ─────────┘
//!         │ retries exhausted                        (to Disconnected)
//!         ▼
//!    ┌────────┐
//!    │ Failed │  terminal until restart
//!    └────────┘
//! ```
//!
//! Failures inside an iteration, panics included, are contained at the
//! iteration boundary and reported; the loop carries on.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ValueCache;
use crate::client::{
    ActivationOutcome, ActivationReport, DataChangeHandler, OpcUaTransport, SubscriptionManager,
};
use crate::error::{OpcUaError, OpcUaResult, SupervisorError};
use crate::retry::RetryDriver;
use crate::sink::NotificationSink;
use crate::status::{ErrorEvent, Message, Notice, StatusChannel, StatusCode, StatusEvent};
use crate::types::SupervisorConfig;
use crate::writer::ValueWriter;

// =============================================================================
// ConnectionState
// =============================================================================

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// Session open, controller not confirmed running.
    ConnectedServerOnly,
    /// Session open, controller running, subscription active.
    ConnectedHealthy,
    /// Retry budget exhausted. Requires a restart.
    Failed,
}

impl ConnectionState {
    /// Returns `true` while a session is open.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::ConnectedServerOnly | Self::ConnectedHealthy)
    }

    /// Returns `true` for the give-up state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::ConnectedServerOnly => write!(f, "ConnectedServerOnly"),
            Self::ConnectedHealthy => write!(f, "ConnectedHealthy"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Result of one reachability and controller-health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HealthObservation {
    /// Reachability probe succeeded.
    pub reachable: bool,
    /// Status node read `true`.
    pub healthy: bool,
}

impl HealthObservation {
    /// An observation of an unreachable server.
    pub const UNREACHABLE: Self = Self {
        reachable: false,
        healthy: false,
    };

    /// Maps the observation to the status shown to the operator.
    pub fn status_code(&self) -> StatusCode {
        match (self.reachable, self.healthy) {
            (false, _) => StatusCode::Disconnected,
            (true, true) => StatusCode::Healthy,
            (true, false) => StatusCode::ServerNotReady,
        }
    }
}

/// Suppresses repeated status codes.
#[derive(Debug, Clone, Copy)]
pub struct StatusDebouncer {
    last: StatusCode,
}

impl StatusDebouncer {
    /// Starts from `initial`, which is treated as already emitted.
    pub fn new(initial: StatusCode) -> Self {
        Self { last: initial }
    }

    /// Returns `Some(code)` if it differs from the last emitted one.
    pub fn observe(&mut self, code: StatusCode) -> Option<StatusCode> {
        if code == self.last {
            None
        } else {
            self.last = code;
            Some(code)
        }
    }

    /// Returns the last emitted code.
    pub fn last(&self) -> StatusCode {
        self.last
    }

    /// Forces the last emitted code.
    pub fn set(&mut self, code: StatusCode) {
        self.last = code;
    }
}

impl Default for StatusDebouncer {
    fn default() -> Self {
        Self::new(StatusCode::Disconnected)
    }
}

// =============================================================================
// ConnectionSupervisor
// =============================================================================

/// Owns the session and drives the state machine.
pub struct ConnectionSupervisor<T: OpcUaTransport + 'static> {
    config: SupervisorConfig,
    transport: Arc<Mutex<T>>,
    subscriptions: SubscriptionManager<T>,
    sink: Arc<NotificationSink>,
    cache: Arc<ValueCache>,
    status: Arc<StatusChannel>,
    state_tx: watch::Sender<ConnectionState>,
    debouncer: StatusDebouncer,
    retry: RetryDriver,
    cancel: CancellationToken,
    activation: Arc<RwLock<Option<ActivationReport>>>,
    initial_attempt: bool,
}

impl<T: OpcUaTransport + 'static> ConnectionSupervisor<T> {
    /// Creates a supervisor for a disconnected transport.
    pub fn new(transport: T, config: SupervisorConfig) -> OpcUaResult<Self> {
        config.validate()?;

        let transport = Arc::new(Mutex::new(transport));
        let cache = Arc::new(ValueCache::new());
        let status = Arc::new(StatusChannel::new(config.language));
        let sink = Arc::new(NotificationSink::new(
            Arc::clone(&cache),
            Arc::clone(&status),
            config.scalar_attribute.clone(),
        ));
        let handler: Arc<dyn DataChangeHandler> = sink.clone();
        let subscriptions = SubscriptionManager::new(
            Arc::clone(&transport),
            handler,
            config.publishing_interval,
        );
        let cancel = CancellationToken::new();
        let retry = RetryDriver::new(config.retry.clone(), cancel.clone()).retrying_all_errors();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            config,
            transport,
            subscriptions,
            sink,
            cache,
            status,
            state_tx,
            debouncer: StatusDebouncer::default(),
            retry,
            cancel,
            activation: Arc::new(RwLock::new(None)),
            initial_attempt: true,
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    /// Returns the status channel.
    pub fn status(&self) -> &Arc<StatusChannel> {
        &self.status
    }

    /// Spawns the loop on the current runtime.
    pub fn spawn(self) -> SupervisorHandle<T> {
        let mut handle = SupervisorHandle {
            state_rx: self.state_tx.subscribe(),
            status: Arc::clone(&self.status),
            cache: Arc::clone(&self.cache),
            writer: ValueWriter::new(
                Arc::clone(&self.transport),
                self.state_tx.subscribe(),
                self.config.pulse_width,
                self.cancel.clone(),
            ),
            activation: Arc::clone(&self.activation),
            cancel: self.cancel.clone(),
            task: None,
        };

        handle.task = Some(tokio::spawn(self.run()));
        handle
    }

    /// Runs the loop until shutdown and returns the final state.
    pub async fn run(mut self) -> ConnectionState {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            nodes = self.config.nodes.len(),
            "Connection supervisor started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.run_iteration().await;

            if self.state().is_terminal() {
                self.cancel.cancelled().await;
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        self.shutdown_sequence().await
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    async fn run_iteration(&mut self) {
        let outcome = AssertUnwindSafe(self.iterate()).catch_unwind().await;

        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                OpcUaError::supervisor(SupervisorError::IterationPanicked { message })
            }
        };

        error.log("supervisor iteration");
        let text = error.to_string();
        self.status
            .report(&error, Message::IterationFailed { error: &text });
    }

    async fn iterate(&mut self) -> OpcUaResult<()> {
        if self.state() == ConnectionState::Disconnected && !self.connect().await? {
            return Ok(());
        }

        let observation = self.observe().await;
        self.apply(observation).await;
        Ok(())
    }

    /// Connects under the retry policy. Returns `false` if no session was
    /// established.
    async fn connect(&mut self) -> OpcUaResult<bool> {
        let transport = Arc::clone(&self.transport);
        let status = Arc::clone(&self.status);
        let mut announce_retry = self.initial_attempt;
        self.initial_attempt = false;

        let result = self
            .retry
            .run(
                move |attempt| {
                    let transport = Arc::clone(&transport);
                    async move {
                        tracing::debug!(attempt = attempt, "Connecting");
                        transport.lock().await.connect().await
                    }
                },
                |failure| {
                    let text = failure.error.to_string();
                    failure.error.log("connect");
                    status.report(
                        failure.error,
                        Message::ConnectAttemptFailed {
                            attempt: failure.attempt,
                            error: &text,
                        },
                    );
                    if announce_retry {
                        status.notice(Message::Retrying);
                        announce_retry = false;
                    }
                },
            )
            .await;

        match result {
            Ok(()) => {
                self.post_connect().await;
                self.status.notice(Message::Connected);
                self.set_state(ConnectionState::ConnectedServerOnly);
                Ok(true)
            }
            Err(OpcUaError::Supervisor(SupervisorError::ShuttingDown)) => Ok(false),
            Err(error) => {
                self.give_up(&error).await;
                Ok(false)
            }
        }
    }

    async fn post_connect(&self) {
        let node = &self.config.status_node;
        let result = self.transport.lock().await.resolve_node(node).await;
        if let Err(e) = result {
            e.log("resolve status node");
            let node_text = node.to_string();
            let text = e.to_string();
            self.status.report(
                &e,
                Message::StatusNodeFailed {
                    node: &node_text,
                    error: &text,
                },
            );
        }
    }

    async fn give_up(&mut self, error: &OpcUaError) {
        error.log("connect");

        if let Err(e) = self.transport.lock().await.disconnect().await {
            tracing::debug!(error = %e, "Cleanup after failed connect reported an error");
        }

        self.debouncer.set(StatusCode::Disconnected);
        self.set_state(ConnectionState::Failed);
        self.status.emit_terminal();
        self.status.notice(Message::GaveUp);
        self.status.notice(Message::RestartHint);
    }

    async fn observe(&self) -> HealthObservation {
        let transport = self.transport.lock().await;

        if let Err(e) = transport.get_endpoints().await {
            tracing::debug!(error = %e, "Reachability probe failed");
            return HealthObservation::UNREACHABLE;
        }

        let healthy = match transport.read_value(&self.config.status_node).await {
            Ok(result) if result.is_good() => {
                result.value.as_ref().and_then(|v| v.as_bool()) == Some(true)
            }
            Ok(result) => {
                tracing::debug!(status_code = result.status_code, "Status node read returned bad status");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Controller health probe failed");
                false
            }
        };

        HealthObservation {
            reachable: true,
            healthy,
        }
    }

    async fn apply(&mut self, observation: HealthObservation) {
        let code = observation.status_code();
        let previous = self.debouncer.last();

        if code == StatusCode::Disconnected && self.state().is_connected() {
            self.teardown().await;
        }

        let Some(code) = self.debouncer.observe(code) else {
            return;
        };

        tracing::debug!(
            reachable = observation.reachable,
            healthy = observation.healthy,
            status = code.code(),
            "Combined status changed"
        );

        match code {
            StatusCode::Disconnected => {
                self.status.emit_status(StatusCode::Disconnected);
                self.status
                    .report_text("connection", Message::ConnectionLost);
            }
            StatusCode::Healthy => {
                if !self.activate().await {
                    // No subscription exists; the next iteration tries again.
                    self.debouncer.set(previous);
                    self.set_state(ConnectionState::ConnectedServerOnly);
                    return;
                }
                self.set_state(ConnectionState::ConnectedHealthy);
                self.status.emit_status(StatusCode::Healthy);
            }
            StatusCode::ServerNotReady => {
                self.deactivate().await;
                self.set_state(ConnectionState::ConnectedServerOnly);
                self.status.emit_status(StatusCode::ServerNotReady);
                self.status.report_text("controller", Message::ConfigMode);
            }
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    async fn teardown(&mut self) {
        tracing::warn!("Server unreachable, tearing down session");

        self.deactivate().await;
        self.cache.reset();

        if let Err(e) = self.transport.lock().await.disconnect().await {
            e.log("disconnect");
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Returns `false` if no subscription could be created.
    async fn activate(&mut self) -> bool {
        // A leftover subscription is replaced rather than duplicated.
        self.deactivate().await;

        match self.subscriptions.activate(&self.config.nodes).await {
            Ok(report) => {
                for (node, reason) in &report.failed {
                    let node_text = node.to_string();
                    self.status.report_text(
                        "subscription",
                        Message::SubscribeFailed {
                            node: &node_text,
                            error: reason,
                        },
                    );
                }
                if report.outcome() == ActivationOutcome::Complete {
                    self.status.notice(Message::ReceivingData);
                }
                *self.activation.write() = Some(report);
                true
            }
            Err(e) => {
                e.log("activate");
                let text = e.to_string();
                self.status
                    .report(&e, Message::SubscriptionFailed { error: &text });
                *self.activation.write() = None;
                false
            }
        }
    }

    async fn deactivate(&mut self) {
        for error in self.subscriptions.deactivate().await {
            let text = error.to_string();
            self.status
                .report(&error, Message::UnsubscribeFailed { error: &text });
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "Connection state changed");
        }
    }

    async fn shutdown_sequence(mut self) -> ConnectionState {
        tracing::info!("Connection supervisor shutting down");

        self.sink.close();
        self.deactivate().await;

        if let Err(e) = self.transport.lock().await.disconnect().await {
            e.log("disconnect");
            let text = e.to_string();
            self.status
                .report(&e, Message::DisconnectFailed { error: &text });
        }

        if !self.state().is_terminal() {
            self.set_state(ConnectionState::Disconnected);
        }

        let state = self.state();
        tracing::info!(state = %state, "Connection supervisor stopped");
        state
    }
}

impl<T: OpcUaTransport + 'static> fmt::Debug for ConnectionSupervisor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("last_status", &self.debouncer.last())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

// =============================================================================
// SupervisorHandle
// =============================================================================

/// Consumer-side view of a running supervisor.
pub struct SupervisorHandle<T: OpcUaTransport + 'static> {
    state_rx: watch::Receiver<ConnectionState>,
    status: Arc<StatusChannel>,
    cache: Arc<ValueCache>,
    writer: ValueWriter<T>,
    activation: Arc<RwLock<Option<ActivationReport>>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<ConnectionState>>,
}

impl<T: OpcUaTransport + 'static> SupervisorHandle<T> {
    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns a receiver for state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Waits until `predicate` holds for the state.
    ///
    /// Returns the matching state, or `None` if the supervisor stopped first.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Option<ConnectionState>
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(|s| predicate(s)).await.ok().map(|s| *s);
        state
    }

    /// Subscribes to status events.
    pub fn subscribe_status(&self) -> tokio::sync::broadcast::Receiver<StatusEvent> {
        self.status.subscribe_status()
    }

    /// Subscribes to notices.
    pub fn subscribe_notices(&self) -> tokio::sync::broadcast::Receiver<Notice> {
        self.status.subscribe_notices()
    }

    /// Subscribes to error events.
    pub fn subscribe_errors(&self) -> tokio::sync::broadcast::Receiver<ErrorEvent> {
        self.status.subscribe_errors()
    }

    /// Returns the last emitted status event.
    pub fn latest_status(&self) -> Option<StatusEvent> {
        self.status.latest_status()
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    /// Returns a writer bound to the session.
    pub fn writer(&self) -> ValueWriter<T> {
        self.writer.clone()
    }

    /// Returns the report of the most recent activation.
    pub fn last_activation(&self) -> Option<ActivationReport> {
        self.activation.read().clone()
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stops the loop, waits for the shutdown sequence and returns the
    /// final state.
    pub async fn shutdown(mut self) -> ConnectionState {
        self.cancel.cancel();

        let Some(task) = self.task.take() else {
            return self.state();
        };

        match task.await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "Supervisor task ended abnormally");
                ConnectionState::Disconnected
            }
        }
    }
}

impl<T: OpcUaTransport + 'static> Drop for SupervisorHandle<T> {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

impl<T: OpcUaTransport + 'static> fmt::Debug for SupervisorHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("state", &self.state())
            .field("finished", &self.is_finished())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(reachable: bool, healthy: bool) -> HealthObservation {
        HealthObservation { reachable, healthy }
    }

    #[test]
    fn test_observation_mapping() {
        assert_eq!(obs(false, false).status_code(), StatusCode::Disconnected);
        assert_eq!(obs(false, true).status_code(), StatusCode::Disconnected);
        assert_eq!(obs(true, false).status_code(), StatusCode::ServerNotReady);
        assert_eq!(obs(true, true).status_code(), StatusCode::Healthy);
    }

    #[test]
    fn test_debouncer_drops_repeats() {
        let mut debouncer = StatusDebouncer::default();
        let sequence = [
            obs(true, true),
            obs(true, true),
            obs(true, false),
            obs(true, false),
            obs(false, false),
            obs(false, true),
            obs(true, true),
        ];

        let emitted: Vec<_> = sequence
            .iter()
            .filter_map(|o| debouncer.observe(o.status_code()))
            .collect();

        assert_eq!(
            emitted,
            vec![
                StatusCode::Healthy,
                StatusCode::ServerNotReady,
                StatusCode::Disconnected,
                StatusCode::Healthy,
            ]
        );
    }

    #[test]
    fn test_debouncer_initial_disconnected_is_silent() {
        let mut debouncer = StatusDebouncer::default();
        assert_eq!(debouncer.observe(StatusCode::Disconnected), None);
        assert_eq!(debouncer.last(), StatusCode::Disconnected);
    }

    #[test]
    fn test_connection_state_flags() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::ConnectedServerOnly.is_connected());
        assert!(ConnectionState::ConnectedHealthy.is_connected());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Failed.is_connected());
    }
}
