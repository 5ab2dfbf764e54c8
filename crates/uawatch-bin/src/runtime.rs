// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Supervisor runtime orchestration.
//!
//! - Configuration loading and overrides
//! - Transport construction
//! - Supervisor start and event logging
//! - Graceful shutdown coordination

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use uawatch_client::{
    ConnectionState, ConnectionSupervisor, OpcUaTransport, RealOpcUaTransport, StatusCode,
    SupervisorHandle,
};
use uawatch_config::{load_config, AppConfig};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// SupervisorRuntime
// =============================================================================

/// Owns the loaded configuration and drives one supervisor.
pub struct SupervisorRuntime {
    config: AppConfig,
    shutdown: ShutdownCoordinator,
}

impl SupervisorRuntime {
    /// Creates a new runtime.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Starts a supervisor over `transport`, with event logging attached.
    pub fn start<T: OpcUaTransport + 'static>(
        &self,
        transport: T,
    ) -> BinResult<(SupervisorHandle<T>, JoinHandle<()>)> {
        let supervisor = ConnectionSupervisor::new(transport, self.config.supervisor.clone())?;
        let handle = supervisor.spawn();
        let events = spawn_event_log(&handle);
        Ok((handle, events))
    }

    /// Supervises until a shutdown signal arrives or the retry budget is
    /// exhausted.
    pub async fn run<T: OpcUaTransport + 'static>(self, transport: T) -> BinResult<()> {
        info!(
            version = uawatch_client::VERSION,
            endpoint = %self.config.opcua.endpoint,
            "Starting uawatch"
        );

        let (handle, events) = self.start(transport)?;

        let gave_up = tokio::select! {
            _ = self.shutdown.wait_for_shutdown() => false,
            state = handle.wait_for_state(|s| s.is_terminal()) => state.is_some(),
        };

        info!("Stopping supervisor...");
        let final_state = handle.shutdown().await;
        events.abort();
        info!(state = %final_state, "uawatch shutdown complete");

        if gave_up {
            return Err(BinError::runtime(
                "connection retries exhausted; restart required",
            ));
        }
        Ok(())
    }

    /// Waits until the controller reports healthy.
    ///
    /// Fails early when the supervisor gives up.
    pub async fn wait_until_healthy<T: OpcUaTransport + 'static>(
        handle: &SupervisorHandle<T>,
        timeout: Duration,
    ) -> BinResult<()> {
        let waited = tokio::time::timeout(
            timeout,
            handle.wait_for_state(|s| {
                matches!(s, ConnectionState::ConnectedHealthy | ConnectionState::Failed)
            }),
        )
        .await;

        match waited {
            Ok(Some(ConnectionState::ConnectedHealthy)) => Ok(()),
            Ok(Some(state)) => Err(BinError::runtime(format!(
                "controller not available (state: {})",
                state
            ))),
            Ok(None) => Err(BinError::runtime("supervisor stopped unexpectedly")),
            Err(_) => Err(BinError::timeout(format!(
                "controller not running after {} (state: {})",
                humantime::format_duration(timeout),
                handle.state()
            ))),
        }
    }
}

// =============================================================================
// Event Logging
// =============================================================================

/// Forwards status, notice and error events into the log until aborted.
pub fn spawn_event_log<T: OpcUaTransport + 'static>(handle: &SupervisorHandle<T>) -> JoinHandle<()> {
    let mut status = handle.subscribe_status();
    let mut notices = handle.subscribe_notices();
    let mut errors = handle.subscribe_errors();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = status.recv() => match event {
                    Ok(event) => match event.code {
                        StatusCode::Healthy => info!(code = event.code.code(), "{}", event.message),
                        _ if event.terminal => error!(code = event.code.code(), "{}", event.message),
                        _ => warn!(code = event.code.code(), "{}", event.message),
                    },
                    Err(e) if !log_recv_error("status", &e) => break,
                    Err(_) => {}
                },
                notice = notices.recv() => match notice {
                    Ok(notice) => info!("{}", notice.message),
                    Err(e) if !log_recv_error("notice", &e) => break,
                    Err(_) => {}
                },
                event = errors.recv() => match event {
                    Ok(event) => warn!(
                        category = %event.category,
                        code = event.code.as_deref().unwrap_or("-"),
                        "{}",
                        event.message
                    ),
                    Err(e) if !log_recv_error("error", &e) => break,
                    Err(_) => {}
                },
            }
        }
    })
}

/// Returns `false` once the stream is closed.
fn log_recv_error(stream: &str, error: &RecvError) -> bool {
    match *error {
        RecvError::Lagged(skipped) => {
            warn!(stream, skipped, "Event log fell behind");
            true
        }
        RecvError::Closed => false,
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<AppConfig>,
    endpoint: Option<String>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the endpoint.
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<SupervisorRuntime> {
        let mut config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path).map_err(|e| {
                    BinError::from(e).with_context(format!("loading {}", path.display()))
                })?
            }
        };

        if let Some(endpoint) = self.endpoint {
            config.opcua.endpoint = endpoint;
            config.validate()?;
        }

        Ok(SupervisorRuntime::new(config))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Builds the network transport for `config`.
pub fn build_transport(config: &AppConfig) -> RealOpcUaTransport {
    RealOpcUaTransport::new(config.opcua.clone())
}

// =============================================================================
// Tests
// =============================================================================
