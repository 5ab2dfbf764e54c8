// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared fixtures, mocks and the supervisor harness.
//!
//! - `fixtures`: Node IDs and fast-ticking configurations
//! - `mocks`: [`MockTransport`](mocks::MockTransport) and its control handle
//! - `harness`: [`SupervisorHarness`](harness::SupervisorHarness)

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of each test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,uawatch_client=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
