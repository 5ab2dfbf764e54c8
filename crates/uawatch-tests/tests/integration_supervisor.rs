// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Supervisor Integration Tests
//!
//! Drives the connection supervisor against the mock server:
//!
//! - Status transitions and debouncing
//! - Connect retries, backoff timing and giving up
//! - Recovery after connection loss
//! - Failure containment and shutdown
//!
//! ## Test Categories
//!
//! - `test_status_*`: combined status and its events
//! - `test_retry_*`: connect retries and the give-up path
//! - `test_recovery_*`: losing and regaining the server
//! - `test_contain_*`: faults inside an iteration
//! - `test_shutdown_*`: stopping the loop

use std::time::Duration;

use uawatch_client::{ConnectionState, ConnectionSupervisor, OpcUaError, OpcUaValue, RetryPolicy};
use uawatch_tests::prelude::*;

const RETRYING: &str = "Cannot connect to the OPC UA server. Retrying.";
const CONNECTED: &str = "Connected to OPC UA server";
const RECEIVING: &str = "Receiving data from server";

// =============================================================================
// Status Transitions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_healthy_startup() {
    init_test_logging();
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1", "myVar2"]));

    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    assert_eq!(harness.status_codes(), vec![1]);
    assert_eq!(harness.notices(), vec![CONNECTED.to_string(), RECEIVING.to_string()]);
    assert!(harness.errors().is_empty());
    assert_eq!(harness.control.connect_count(), 1);
    assert_eq!(harness.control.monitored_nodes().len(), 2);

    let latest = harness.handle.latest_status().expect("status emitted");
    assert_eq!(latest.message, "Connected, controller running");
    assert!(!latest.terminal);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_debounced_while_unchanged() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    harness.polls(40).await;

    assert_eq!(harness.status_codes(), vec![1]);
    assert_eq!(harness.control.subscriptions_created(), 1);
    assert_eq!(harness.control.connect_count(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_config_mode_at_startup() {
    let mut harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_controller_running(false);
    });

    harness.wait_for(ConnectionState::ConnectedServerOnly).await;
    harness.polls(5).await;

    assert_eq!(harness.status_codes(), vec![2]);
    assert_eq!(harness.state(), ConnectionState::ConnectedServerOnly);
    assert_eq!(harness.control.subscriptions_created(), 0);

    let controller = harness.errors_in("controller");
    assert_eq!(controller.len(), 1);
    assert!(controller[0].message.contains("config mode"));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_follows_run_mode() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1", "myVar2"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    harness.control.set_controller_running(false);
    harness.wait_for(ConnectionState::ConnectedServerOnly).await;
    assert!(harness.control.monitored_nodes().is_empty());
    assert_eq!(harness.control.subscriptions_deleted(), 1);
    assert!(harness.handle.last_activation().is_some());

    harness.control.set_controller_running(true);
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    assert_eq!(harness.status_codes(), vec![1, 2, 1]);
    assert_eq!(harness.control.subscriptions_created(), 2);
    assert_eq!(harness.control.monitored_nodes().len(), 2);
    // Config mode keeps the session.
    assert_eq!(harness.control.connect_count(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_unsubscribe_failure_is_reported() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1", "myVar2"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    harness.control.set_fail_unsubscribe(true);
    harness.control.set_controller_running(false);
    harness.wait_for(ConnectionState::ConnectedServerOnly).await;

    let failures: Vec<_> = harness
        .errors_in("subscription")
        .into_iter()
        .filter(|e| e.message.starts_with("Error removing subscription"))
        .collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(harness.control.subscriptions_deleted(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_activation_failure_retried() {
    let mut harness = SupervisorHarness::start_with(ConfigFixtures::scalar(&["myVar1"]), |control| {
        control.fail_create_subscription(1);
    });
    let mut states = harness.handle.state_changes();

    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ConnectionState::ConnectedServerOnly);
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    // Healthy is announced only once a subscription exists.
    assert_eq!(harness.status_codes(), vec![1]);
    assert_eq!(harness.errors_in("subscription").len(), 1);
    assert_eq!(harness.control.subscriptions_created(), 1);
    assert_eq!(harness.control.monitored_nodes(), vec![NodeFixtures::var("myVar1")]);
    assert_eq!(harness.control.connect_count(), 1);

    let node = NodeFixtures::var("myVar1");
    assert!(harness.control.emit(&node, OpcUaValue::Int32(5)));
    assert_eq!(harness.handle.cache().get(&node, "value"), Some(OpcUaValue::Int32(5)));

    harness.shutdown().await;
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_waits_then_gives_up() {
    let mut harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_connect(ConnectBehavior::RefuseAlways);
    });

    harness.wait_for(ConnectionState::Failed).await;

    assert_eq!(harness.control.connect_count(), 3);
    let gaps = harness.control.connect_gaps();
    assert_eq!(gaps.len(), 2);
    assert_between(gaps[0], Duration::from_secs(1));
    assert_between(gaps[1], Duration::from_secs(2));

    let statuses = harness.statuses().to_vec();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].terminal);
    assert_eq!(statuses[0].code.code(), 0);

    let notices = harness.notices();
    assert_eq!(notices.iter().filter(|n| *n == RETRYING).count(), 1);
    assert!(notices.iter().any(|n| n.contains("Giving up")));
    assert!(notices.iter().any(|n| n.contains("restart the application")));
    assert!(!notices.iter().any(|n| n == CONNECTED));

    let attempts = harness.errors_in("connection");
    assert_eq!(attempts.len(), 3);
    assert!(attempts[0].message.contains("(attempt 1)"));
    assert!(attempts[2].message.contains("(attempt 3)"));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_failed_is_terminal() {
    let harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_connect(ConnectBehavior::RefuseAlways);
    });
    harness.wait_for(ConnectionState::Failed).await;

    // Even a recovered server is not retried.
    harness.control.set_connect(ConnectBehavior::Accept);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(harness.state(), ConnectionState::Failed);
    assert_eq!(harness.control.connect_count(), 3);
    assert!(!harness.handle.is_finished());

    let (state, control) = harness.shutdown().await;
    assert_eq!(state, ConnectionState::Failed);
    assert!(!control.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_within_budget() {
    let mut harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_connect(ConnectBehavior::RefuseTimes(2));
    });

    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    assert_eq!(harness.control.connect_count(), 3);
    assert_eq!(harness.errors_in("connection").len(), 2);
    assert_eq!(harness.status_codes(), vec![1]);

    let notices = harness.notices();
    assert_eq!(notices.iter().filter(|n| *n == RETRYING).count(), 1);
    assert!(notices.iter().any(|n| n == CONNECTED));

    harness.shutdown().await;
}

#[test]
fn test_retry_cap_that_stops_doubling_is_rejected() {
    let retry = RetryPolicy::new(5, Duration::from_secs(1)).with_max_delay(Duration::from_secs(3));
    let config = ConfigFixtures::with_retry(&["myVar1"], retry);
    let (transport, control) = MockTransport::new(config.status_node.clone());

    let result = ConnectionSupervisor::new(transport, config);

    assert!(matches!(result, Err(OpcUaError::Configuration(_))));
    assert_eq!(control.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_cap_above_last_wait_keeps_doubling() {
    let retry = RetryPolicy::new(4, Duration::from_secs(1)).with_max_delay(Duration::from_secs(4));
    let harness = SupervisorHarness::start_with(
        ConfigFixtures::with_retry(&["myVar1"], retry),
        |control| control.set_connect(ConnectBehavior::RefuseAlways),
    );

    harness.wait_for(ConnectionState::Failed).await;

    let gaps = harness.control.connect_gaps();
    assert_eq!(gaps.len(), 3);
    assert_between(gaps[0], Duration::from_secs(1));
    assert_between(gaps[1], Duration::from_secs(2));
    assert_between(gaps[2], Duration::from_secs(4));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_rejected_login_spends_budget() {
    let mut harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_connect(ConnectBehavior::RejectLogin);
    });

    harness.wait_for(ConnectionState::Failed).await;

    assert_eq!(harness.control.connect_count(), 3);
    let gaps = harness.control.connect_gaps();
    assert_eq!(gaps.len(), 2);
    assert_between(gaps[0], Duration::from_secs(1));
    assert_between(gaps[1], Duration::from_secs(2));

    let attempts = harness.errors_in("connection");
    assert_eq!(attempts.len(), 3);
    assert!(attempts[0].message.contains("operator"));
    assert!(harness.statuses()[0].terminal);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_login_accepted_after_restart() {
    let harness = SupervisorHarness::start_with(ConfigFixtures::fast(&["myVar1"]), |control| {
        control.set_connect(ConnectBehavior::RejectLogin);
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.state(), ConnectionState::Disconnected);
    harness.control.set_connect(ConnectBehavior::Accept);

    harness.wait_for(ConnectionState::ConnectedHealthy).await;
    assert_eq!(harness.control.connect_count(), 2);

    harness.shutdown().await;
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_recovery_after_connection_loss() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::scalar(&["myVar1"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    let node = NodeFixtures::var("myVar1");
    assert!(harness.control.emit(&node, uawatch_client::OpcUaValue::Double(1.5)));
    assert!(harness.handle.cache().get(&node, "value").is_some());

    harness.control.set_reachable(false);
    harness.wait_for(ConnectionState::Disconnected).await;

    assert!(harness.handle.cache().is_empty());
    assert!(!harness.control.is_connected());
    assert!(harness.control.monitored_nodes().is_empty());
    let lost = harness.errors_in("connection");
    assert_eq!(lost.len(), 1);
    assert!(lost[0].message.contains("lost"));

    harness.control.set_reachable(true);
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    assert_eq!(harness.status_codes(), vec![1, 0, 1]);
    assert_eq!(harness.control.subscriptions_created(), 2);
    assert_eq!(harness.control.monitored_nodes(), vec![node]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_flaky_server() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    for _ in 0..3 {
        harness.control.set_reachable(false);
        harness.wait_for(ConnectionState::Disconnected).await;
        harness.control.set_reachable(true);
        harness.wait_for(ConnectionState::ConnectedHealthy).await;
    }

    assert_eq!(harness.status_codes(), vec![1, 0, 1, 0, 1, 0, 1]);
    // No subscription outlives its session.
    assert_eq!(
        harness.control.subscriptions_created(),
        harness.control.subscriptions_deleted() + 1
    );
    assert_eq!(harness.control.monitored_nodes(), vec![NodeFixtures::var("myVar1")]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_gives_up_when_server_stays_down() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    harness.control.set_reachable(false);
    harness.wait_for(ConnectionState::Failed).await;

    // One initial connect, then a fresh budget of three.
    assert_eq!(harness.control.connect_count(), 4);

    let statuses = harness.statuses().to_vec();
    let codes: Vec<u8> = statuses.iter().map(|e| e.code.code()).collect();
    assert_eq!(codes, vec![1, 0, 0]);
    assert!(!statuses[1].terminal);
    assert!(statuses[2].terminal);

    harness.shutdown().await;
}

// =============================================================================
// Containment
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_contain_panic_in_iteration() {
    let mut harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    harness.control.panic_next_probe();
    harness.polls(5).await;

    let failures = harness.errors_in("supervisor");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.contains("simulated fault"));

    // The loop keeps going.
    assert!(!harness.handle.is_finished());
    assert_eq!(harness.state(), ConnectionState::ConnectedHealthy);

    harness.control.set_controller_running(false);
    harness.wait_for(ConnectionState::ConnectedServerOnly).await;
    assert_eq!(harness.status_codes(), vec![1, 2]);

    harness.shutdown().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_session() {
    let harness = SupervisorHarness::start(ConfigFixtures::fast(&["myVar1", "myVar2"]));
    harness.wait_for(ConnectionState::ConnectedHealthy).await;

    let (state, control) = harness.shutdown().await;

    assert_eq!(state, ConnectionState::Disconnected);
    assert!(!control.is_connected());
    assert!(control.monitored_nodes().is_empty());
    assert_eq!(control.subscriptions_deleted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_retry_wait() {
    let retry = RetryPolicy::new(3, Duration::from_secs(30));
    let harness = SupervisorHarness::start_with(
        ConfigFixtures::with_retry(&["myVar1"], retry),
        |control| control.set_connect(ConnectBehavior::RefuseAlways),
    );

    harness.polls(1).await;
    assert_eq!(harness.control.connect_count(), 1);

    let started = tokio::time::Instant::now();
    let (state, control) = harness.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(state, ConnectionState::Disconnected);
    assert_eq!(control.connect_count(), 1);
}

fn assert_between(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected a wait of about {:?}, got {:?}",
        expected,
        actual
    );
}
