// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Supervisor Harness
//!
//! Runs a [`ConnectionSupervisor`] over a [`MockTransport`] and records
//! every status event, notice and error event it emits.
//!
//! Meant for `#[tokio::test(start_paused = true)]`: the supervisor's poll
//! and retry timers then advance virtual time, and a suite covering minutes
//! of backoff finishes instantly.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use uawatch_client::{
    ConnectionState, ConnectionSupervisor, ErrorEvent, Notice, StatusEvent, SupervisorConfig,
    SupervisorHandle,
};

use super::fixtures::FAST_POLL;
use super::mocks::{MockController, MockTransport};

/// Default bound for [`SupervisorHarness::wait_for`].
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// SupervisorHarness
// =============================================================================

/// A running supervisor plus the recorded event streams.
pub struct SupervisorHarness {
    /// Handle of the running supervisor.
    pub handle: SupervisorHandle<MockTransport>,
    /// Script and inspection handle for the mock server.
    pub control: MockController,
    status_rx: broadcast::Receiver<StatusEvent>,
    notice_rx: broadcast::Receiver<Notice>,
    error_rx: broadcast::Receiver<ErrorEvent>,
    statuses: Vec<StatusEvent>,
    notices: Vec<Notice>,
    errors: Vec<ErrorEvent>,
}

impl SupervisorHarness {
    /// Starts a supervisor against a default mock server.
    pub fn start(config: SupervisorConfig) -> Self {
        Self::start_with(config, |_| {})
    }

    /// Starts a supervisor after `script` prepared the mock server.
    pub fn start_with<F>(config: SupervisorConfig, script: F) -> Self
    where
        F: FnOnce(&MockController),
    {
        let (transport, control) = MockTransport::new(config.status_node.clone());
        script(&control);

        let supervisor = match ConnectionSupervisor::new(transport, config) {
            Ok(supervisor) => supervisor,
            Err(e) => panic!("test configuration rejected: {}", e),
        };
        let handle = supervisor.spawn();

        // The loop has not run yet; nothing emitted so far is missed.
        Self {
            status_rx: handle.subscribe_status(),
            notice_rx: handle.subscribe_notices(),
            error_rx: handle.subscribe_errors(),
            handle,
            control,
            statuses: Vec::new(),
            notices: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Waits until the supervisor reaches `state`.
    ///
    /// # Panics
    ///
    /// If it does not get there within [`WAIT_TIMEOUT`].
    pub async fn wait_for(&self, state: ConnectionState) {
        let reached = tokio::time::timeout(WAIT_TIMEOUT, self.handle.wait_for_state(|s| *s == state))
            .await;
        match reached {
            Ok(Some(_)) => {}
            Ok(None) => panic!("supervisor stopped before reaching {}", state),
            Err(_) => panic!(
                "supervisor did not reach {} within {:?} (stuck in {})",
                state,
                WAIT_TIMEOUT,
                self.state()
            ),
        }
    }

    /// Lets `n` poll intervals pass.
    pub async fn polls(&self, n: u32) {
        tokio::time::sleep(FAST_POLL * n).await;
    }

    // =========================================================================
    // Recorded Events
    // =========================================================================

    /// Moves everything received so far into the recorded lists.
    pub fn drain(&mut self) {
        drain_into(&mut self.status_rx, &mut self.statuses);
        drain_into(&mut self.notice_rx, &mut self.notices);
        drain_into(&mut self.error_rx, &mut self.errors);
    }

    /// Recorded status events.
    pub fn statuses(&mut self) -> &[StatusEvent] {
        self.drain();
        &self.statuses
    }

    /// Recorded status codes, in emission order.
    pub fn status_codes(&mut self) -> Vec<u8> {
        self.statuses().iter().map(|e| e.code.code()).collect()
    }

    /// Recorded notice texts.
    pub fn notices(&mut self) -> Vec<String> {
        self.drain();
        self.notices.iter().map(|n| n.message.clone()).collect()
    }

    /// Recorded error events.
    pub fn errors(&mut self) -> &[ErrorEvent] {
        self.drain();
        &self.errors
    }

    /// Recorded error events of one category.
    pub fn errors_in(&mut self, category: &str) -> Vec<ErrorEvent> {
        self.errors()
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.drain();
        self.statuses.clear();
        self.notices.clear();
        self.errors.clear();
    }

    /// Stops the supervisor and returns its final state.
    pub async fn shutdown(self) -> (ConnectionState, MockController) {
        let state = self.handle.shutdown().await;
        (state, self.control)
    }
}

fn drain_into<E: Clone>(rx: &mut broadcast::Receiver<E>, into: &mut Vec<E>) {
    loop {
        match rx.try_recv() {
            Ok(event) => into.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                panic!("test listener lagged by {} events", skipped)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}
