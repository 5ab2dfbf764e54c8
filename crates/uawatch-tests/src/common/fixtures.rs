// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Node IDs and configurations shared by the integration suites.

use std::time::Duration;

use uawatch_client::{Language, NodeId, RetryPolicy, SupervisorConfig};

/// Poll interval used by the fast configurations.
pub const FAST_POLL: Duration = Duration::from_millis(50);

/// Pulse width used by the fast configurations.
pub const FAST_PULSE: Duration = Duration::from_millis(20);

// =============================================================================
// Nodes
// =============================================================================

/// Well-known nodes of the simulated controller.
pub struct NodeFixtures;

impl NodeFixtures {
    /// The controller run-mode flag.
    pub fn status() -> NodeId {
        NodeId::string(4, "OPCUA.bServerStatus")
    }

    /// A monitored variable in the `MAIN` program.
    pub fn var(name: &str) -> NodeId {
        NodeId::string(4, format!("MAIN.{}", name))
    }

    /// Axis target position.
    pub fn axis() -> NodeId {
        NodeId::string(4, "MAIN.fAxisTarget")
    }

    /// Confirm push-button for the axis.
    pub fn button() -> NodeId {
        NodeId::string(4, "MAIN.bMoveAbsolute")
    }
}

// =============================================================================
// Configurations
// =============================================================================

/// Supervisor configurations tuned for tests.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Fast polling over `nodes`, three attempts with 1s then 2s waits.
    pub fn fast(nodes: &[&str]) -> SupervisorConfig {
        Self::with_retry(nodes, RetryPolicy::new(3, Duration::from_secs(1)))
    }

    /// Fast polling with a custom retry policy.
    pub fn with_retry(nodes: &[&str], retry: RetryPolicy) -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: FAST_POLL,
            status_node: NodeFixtures::status(),
            nodes: nodes.iter().map(|n| NodeFixtures::var(n)).collect(),
            publishing_interval: Duration::from_millis(10),
            retry,
            pulse_width: FAST_PULSE,
            language: Language::En,
            scalar_attribute: None,
        }
    }

    /// Like [`fast`](Self::fast), with scalar payloads cached under `value`.
    pub fn scalar(nodes: &[&str]) -> SupervisorConfig {
        SupervisorConfig {
            scalar_attribute: Some("value".to_string()),
            ..Self::fast(nodes)
        }
    }
}
