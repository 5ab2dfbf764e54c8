// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session-facing half of the client.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   ConnectionSupervisor                          │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                               │
//!                  ▼                               ▼
//! ┌───────────────────────────────┐  ┌─────────────────────────────┐
//! │     SubscriptionManager       │  │        ValueWriter          │
//! └───────────────────────────────┘  └─────────────────────────────┘
//!                  │                               │
//!                  ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          Arc<Mutex<impl OpcUaTransport>>  (one session lock)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod subscription;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use subscription::{ActivationOutcome, ActivationReport, SubscriptionManager};
pub use transport::{
    DataChangeEvent, DataChangeHandler, FieldValue, OpcUaTransport, OpcUaValue, ReadResult,
    StructureField, StructureValue, TransportState, WriteResult,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
