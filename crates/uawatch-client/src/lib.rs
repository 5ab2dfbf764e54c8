// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection and subscription supervisor for an OPC UA controller.
//!
//! A background [`ConnectionSupervisor`] keeps one session to the server
//! alive, watches reachability and the controller's run-mode flag, reconnects
//! under a bounded [`RetryPolicy`], and keeps exactly one subscription alive
//! while the controller is running. Change notifications are folded into a
//! concurrently readable [`ValueCache`].
//!
//! Display layers consume three things:
//!
//! - the [`ValueCache`] (read-only, any thread)
//! - the status, notice and error streams of the [`StatusChannel`]
//! - the [`ValueWriter`] for commands
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint, session and reachability failures
//! ├── Operation     - Read/write rejected by the server
//! ├── Subscription  - Subscription and monitored item failures
//! ├── Conversion    - Command values that cannot be encoded
//! ├── Decode        - Notification payloads that cannot be cached
//! ├── Configuration - Invalid settings
//! └── Supervisor    - Retry exhaustion, shutdown, contained panics
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uawatch_client::{ConnectionSupervisor, OpcUaConfig, RealOpcUaTransport, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = RealOpcUaTransport::new(OpcUaConfig::default());
//!     let handle = ConnectionSupervisor::new(transport, SupervisorConfig::default())?.spawn();
//!
//!     let mut status = handle.subscribe_status();
//!     while let Ok(event) = status.recv().await {
//!         println!("{}: {}", event.code, event.message);
//!     }
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod client;
pub mod error;
pub mod retry;
pub mod sink;
pub mod status;
pub mod supervisor;
pub mod types;
pub mod writer;

pub use error::{
    ConfigurationError, ConnectionError, ConversionError, DecodeError, ErrorCode, ErrorSeverity,
    OpcUaError, OpcUaResult, OperationError, SubscriptionError, SupervisorError,
};

pub use types::{
    NodeId, NodeIdentifier, OpcUaConfig, OpcUaConfigBuilder, SubscriptionSettings,
    SupervisorConfig, SupervisorConfigBuilder, UserTokenType,
};

pub use client::{
    ActivationOutcome, ActivationReport, DataChangeEvent, DataChangeHandler, FieldValue,
    OpcUaTransport, OpcUaValue, ReadResult, StructureField, StructureValue, SubscriptionManager,
    TransportState, WriteResult,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use cache::{CacheStats, CachedValue, ValueCache};
pub use retry::{AttemptFailure, RetryDriver, RetryPolicy};
pub use sink::{IngestOutcome, NotificationSink, PayloadShape};
pub use status::{ErrorEvent, Language, Message, Notice, StatusChannel, StatusCode, StatusEvent};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, HealthObservation, StatusDebouncer, SupervisorHandle,
};
pub use writer::{apply_field_updates, ValueWriter, WriteValue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
