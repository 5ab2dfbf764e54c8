// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawatch Integration Tests
//!
//! Test support and integration tests for the uawatch connection
//! supervisor. Everything runs against an in-memory transport, so no OPC UA
//! server is needed.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Node IDs and configurations used across suites
//!   - `mocks`: Scriptable in-memory transport
//!   - `harness`: Supervisor wrapper that records every emitted event
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p uawatch-tests
//!
//! # Run specific test suite
//! cargo test -p uawatch-tests --test integration_supervisor
//! cargo test -p uawatch-tests --test integration_subscription
//! cargo test -p uawatch-tests --test integration_write
//! cargo test -p uawatch-tests --test integration_config
//!
//! # Run with log output
//! RUST_LOG=uawatch_client=debug cargo test -p uawatch-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Supervisor Tests (`integration_supervisor.rs`)
//! - Status transitions and debouncing
//! - Connect retries, backoff timing and giving up
//! - Recovery after connection loss
//! - Failure containment and shutdown
//!
//! ### Subscription Tests (`integration_subscription.rs`)
//! - Partial activation and per-node errors
//! - Notifications reaching the value cache
//! - Teardown on config mode and connection loss
//!
//! ### Write Tests (`integration_write.rs`)
//! - Disconnected writes
//! - Pulses and absolute positioning
//! - Bad status codes
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON loading
//! - Environment overrides
//! - Configuration driving a supervisor

pub mod common;

/// Re-exports for test files.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::init_test_logging;
}
