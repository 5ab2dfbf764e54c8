// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lifecycle of the single server-side subscription.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SubscriptionManager                          │
//! │        (at most one subscription, driven by the supervisor)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ Subscription (ID n) │ ── notifications ──▶ DataChangeHandler
//!                   └─────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!         MonitoredItem  MonitoredItem  MonitoredItem
//!           (node A)       (node B)       (node C)
//! ```
//!
//! Attaching a node can fail on its own. Activation keeps going and
//! reports which nodes are live and which failed in an [`ActivationReport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::{OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::NodeId;

use super::transport::{DataChangeHandler, OpcUaTransport};

// =============================================================================
// ActivationReport
// =============================================================================

/// Overall result of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationOutcome {
    /// Every requested node is monitored.
    Complete,
    /// Some nodes are monitored, some failed.
    Partial,
    /// No requested node could be monitored.
    Failed,
}

impl fmt::Display for ActivationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-node result of [`SubscriptionManager::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// The subscription that was created.
    pub subscription_id: u32,
    /// Nodes with a live monitored item, in request order.
    pub live: Vec<NodeId>,
    /// Nodes that could not be attached, with the reason.
    pub failed: Vec<(NodeId, String)>,
}

impl ActivationReport {
    /// Classifies the report.
    pub fn outcome(&self) -> ActivationOutcome {
        match (self.live.is_empty(), self.failed.is_empty()) {
            (_, true) => ActivationOutcome::Complete,
            (false, false) => ActivationOutcome::Partial,
            (true, false) => ActivationOutcome::Failed,
        }
    }
}

// =============================================================================
// SubscriptionManager
// =============================================================================

#[derive(Debug, Clone)]
struct ActiveSubscription {
    subscription_id: u32,
    items: Vec<(NodeId, u32)>,
}

/// Owns the subscription and its monitored items.
///
/// Only the supervisor calls [`activate`](Self::activate) and
/// [`deactivate`](Self::deactivate). Every transport call goes through the
/// shared session lock.
pub struct SubscriptionManager<T: OpcUaTransport> {
    transport: Arc<Mutex<T>>,
    handler: Arc<dyn DataChangeHandler>,
    publishing_interval: Duration,
    active: parking_lot::Mutex<Option<ActiveSubscription>>,
}

impl<T: OpcUaTransport> SubscriptionManager<T> {
    /// Creates a manager delivering notifications to `handler`.
    pub fn new(
        transport: Arc<Mutex<T>>,
        handler: Arc<dyn DataChangeHandler>,
        publishing_interval: Duration,
    ) -> Self {
        Self {
            transport,
            handler,
            publishing_interval,
            active: parking_lot::Mutex::new(None),
        }
    }

    /// Returns the publishing interval.
    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    /// Returns `true` if a subscription exists.
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Returns the live subscription ID.
    pub fn subscription_id(&self) -> Option<u32> {
        self.active.lock().as_ref().map(|a| a.subscription_id)
    }

    /// Returns the nodes with a live monitored item.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.items.iter().map(|(node, _)| node.clone()).collect())
            .unwrap_or_default()
    }

    /// Creates the subscription and attaches one monitored item per node.
    ///
    /// Fails only if a subscription already exists or the subscription
    /// itself cannot be created. Per-node failures are collected in the
    /// report and do not abort the remaining nodes.
    pub async fn activate(&self, nodes: &[NodeId]) -> OpcUaResult<ActivationReport> {
        if let Some(subscription_id) = self.subscription_id() {
            return Err(OpcUaError::subscription(SubscriptionError::AlreadyActive {
                subscription_id,
            }));
        }

        let transport = self.transport.lock().await;
        let subscription_id = transport
            .create_subscription(self.publishing_interval, Arc::clone(&self.handler))
            .await?;

        tracing::debug!(
            subscription_id = subscription_id,
            publishing_interval_ms = self.publishing_interval.as_millis() as u64,
            "Subscription created"
        );

        let mut items = Vec::with_capacity(nodes.len());
        let mut failed = Vec::new();

        for node in nodes {
            match transport.subscribe_data_change(subscription_id, node).await {
                Ok(item_id) => {
                    tracing::debug!(
                        subscription_id = subscription_id,
                        node_id = %node,
                        monitored_item_id = item_id,
                        "Monitored item attached"
                    );
                    items.push((node.clone(), item_id));
                }
                Err(e) => {
                    tracing::warn!(
                        subscription_id = subscription_id,
                        node_id = %node,
                        error = %e,
                        "Failed to attach monitored item"
                    );
                    failed.push((node.clone(), e.to_string()));
                }
            }
        }
        drop(transport);

        let report = ActivationReport {
            subscription_id,
            live: items.iter().map(|(node, _)| node.clone()).collect(),
            failed,
        };

        *self.active.lock() = Some(ActiveSubscription {
            subscription_id,
            items,
        });

        tracing::info!(
            subscription_id = subscription_id,
            live = report.live.len(),
            failed = report.failed.len(),
            outcome = %report.outcome(),
            "Subscription activated"
        );

        Ok(report)
    }

    /// Detaches every monitored item and deletes the subscription.
    ///
    /// Best-effort: each failure is logged and returned, and the
    /// bookkeeping is cleared regardless. With no subscription this is a
    /// no-op.
    pub async fn deactivate(&self) -> Vec<OpcUaError> {
        let Some(active) = self.active.lock().take() else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        let transport = self.transport.lock().await;

        for (node, item_id) in &active.items {
            if let Err(e) = transport.unsubscribe(active.subscription_id, *item_id).await {
                tracing::warn!(
                    subscription_id = active.subscription_id,
                    node_id = %node,
                    monitored_item_id = item_id,
                    error = %e,
                    "Failed to remove monitored item"
                );
                errors.push(e);
            }
        }

        if let Err(e) = transport.delete_subscription(active.subscription_id).await {
            tracing::warn!(
                subscription_id = active.subscription_id,
                error = %e,
                "Failed to delete subscription"
            );
            errors.push(e);
        }

        tracing::info!(
            subscription_id = active.subscription_id,
            items = active.items.len(),
            errors = errors.len(),
            "Subscription deactivated"
        );

        errors
    }
}

impl<T: OpcUaTransport> fmt::Debug for SubscriptionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("publishing_interval", &self.publishing_interval)
            .field("subscription_id", &self.subscription_id())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeId {
        NodeId::string(4, name)
    }

    #[test]
    fn test_outcome_classification() {
        let mut report = ActivationReport {
            subscription_id: 1,
            live: vec![node("A"), node("C")],
            failed: vec![],
        };
        assert_eq!(report.outcome(), ActivationOutcome::Complete);

        report.failed.push((node("B"), "BadNodeIdUnknown".into()));
        assert_eq!(report.outcome(), ActivationOutcome::Partial);

        report.live.clear();
        assert_eq!(report.outcome(), ActivationOutcome::Failed);
    }

    #[test]
    fn test_empty_request_is_complete() {
        let report = ActivationReport {
            subscription_id: 7,
            live: vec![],
            failed: vec![],
        };
        assert_eq!(report.outcome(), ActivationOutcome::Complete);
    }
}
