// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded reconnection schedule and the driver that consumes it.
//!
//! A [`RetryPolicy`] is a plain value: an attempt budget and a geometric
//! wait schedule. [`RetryDriver`] runs an async operation against a policy,
//! sleeping between failed attempts and giving up once the budget is spent.
//! There is never a wait after the last attempt.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use uawatch_client::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let waits: Vec<Duration> = policy.delays().collect();
//! assert_eq!(waits, vec![Duration::from_secs(1), Duration::from_secs(2)]);
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult, SupervisorError};

// =============================================================================
// RetryPolicy
// =============================================================================

/// Attempt budget and wait schedule for reconnection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after the first failed attempt.
    #[serde(default = "default_initial_delay")]
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Growth factor applied to every following wait.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for a single wait.
    #[serde(default = "default_max_delay")]
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Creates a doubling policy.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the wait cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Validates the policy.
    ///
    /// The multiplier must be at least 2 and the cap must not be reached
    /// before the last wait, so that every wait at least doubles.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.max_attempts == 0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            )));
        }

        if !self.multiplier.is_finite() || self.multiplier < 2.0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "retry.multiplier",
                format!("must be at least 2.0, got {}", self.multiplier),
            )));
        }

        if self.max_delay < self.initial_delay {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "retry.max_delay",
                "must not be shorter than retry.initial_delay",
            )));
        }

        if let Some(last) = self.uncapped_delay(self.max_attempts.saturating_sub(1)) {
            if last > self.max_delay.as_secs_f64() {
                return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                    "retry.max_delay",
                    format!(
                        "{:?} is reached before the last of {} attempts; raise it to at least {:?} or lower retry.max_attempts",
                        self.max_delay,
                        self.max_attempts,
                        Duration::from_secs_f64(last)
                    ),
                )));
            }
        }

        Ok(())
    }

    /// Returns the wait after failed attempt `attempt` (1-based).
    ///
    /// Returns `None` once the budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let secs = self.uncapped_delay(attempt)?;
        let delay = if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        };
        Some(delay)
    }

    /// Geometric wait in seconds after failed attempt `attempt`, ignoring the cap.
    fn uncapped_delay(&self, attempt: u32) -> Option<f64> {
        if attempt == 0 {
            return None;
        }
        let factor = self.multiplier.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
        Some(self.initial_delay.as_secs_f64() * factor)
    }

    /// Returns the ordered waits between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).filter_map(move |attempt| self.delay_after(attempt))
    }
}

// =============================================================================
// RetryDriver
// =============================================================================

/// Information passed to the failure observer after each failed attempt.
#[derive(Debug)]
pub struct AttemptFailure<'a> {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// The error of this attempt.
    pub error: &'a OpcUaError,
    /// Wait before the next attempt, `None` if this was the last one.
    pub next_delay: Option<Duration>,
}

/// Runs an operation under a [`RetryPolicy`].
///
/// Waits are cut short by the cancellation token, in which case the driver
/// returns [`SupervisorError::ShuttingDown`].
#[derive(Debug, Clone)]
pub struct RetryDriver {
    policy: RetryPolicy,
    cancel: CancellationToken,
    retry_all: bool,
}

impl RetryDriver {
    /// Creates a driver.
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            policy,
            cancel,
            retry_all: false,
        }
    }

    /// Spends the whole budget on every error, retryable or not.
    ///
    /// A controller rejects logins while it restarts, so connect attempts
    /// cannot trust [`OpcUaError::is_retryable`].
    pub fn retrying_all_errors(mut self) -> Self {
        self.retry_all = true;
        self
    }

    /// Returns the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds or the budget is spent.
    ///
    /// `on_failure` is called once per failed attempt. A non-retryable error
    /// ends the run early unless [`retrying_all_errors`](Self::retrying_all_errors)
    /// is set. The final error is
    /// [`SupervisorError::RetriesExhausted`] carrying the last message.
    pub async fn run<F, Fut, T, O>(&self, mut operation: F, mut on_failure: O) -> OpcUaResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = OpcUaResult<T>>,
        O: FnMut(AttemptFailure<'_>),
    {
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(OpcUaError::supervisor(SupervisorError::ShuttingDown));
            }

            attempt += 1;

            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let next_delay = if self.retry_all || error.is_retryable() {
                self.policy.delay_after(attempt)
            } else {
                None
            };

            on_failure(AttemptFailure {
                attempt,
                max_attempts: self.policy.max_attempts,
                error: &error,
                next_delay,
            });

            let Some(delay) = next_delay else {
                return Err(OpcUaError::supervisor(SupervisorError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                }));
            };

            tracing::debug!(
                attempt = attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying operation"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(OpcUaError::supervisor(SupervisorError::ShuttingDown));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;
    use tokio::time::Instant;

    fn refused() -> OpcUaError {
        OpcUaError::connection(ConnectionError::refused("opc.tcp://localhost:4840"))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        let waits: Vec<_> = policy.delays().collect();
        assert_eq!(waits, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_after_budget() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), None);
        assert_eq!(policy.delay_after(0), None);
    }

    #[test]
    fn test_cap_reached_early_is_rejected() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(3));
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("retry.max_delay"));

        let policy = RetryPolicy::new(10, Duration::from_secs(2));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_valid_policy_always_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(8));
        policy.validate().unwrap();

        let waits: Vec<_> = policy.delays().collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert!(waits.windows(2).all(|w| w[1] >= w[0] * 2));
    }

    #[test]
    fn test_single_attempt_ignores_cap() {
        let policy = RetryPolicy::new(1, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(1));
        assert!(policy.validate().is_ok());
        assert_eq!(policy.delays().count(), 0);
    }

    #[test]
    fn test_validation() {
        assert!(RetryPolicy::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(1))
            .with_multiplier(1.5)
            .validate()
            .is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(1))
            .with_multiplier(3.0)
            .validate()
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_waits_between_attempts() {
        let driver = RetryDriver::new(
            RetryPolicy::new(3, Duration::from_secs(1)),
            CancellationToken::new(),
        );

        let mut calls = Vec::new();
        let mut observed = Vec::new();
        let start = Instant::now();

        let result: OpcUaResult<()> = driver
            .run(
                |attempt| {
                    calls.push((attempt, start.elapsed()));
                    async { Err(refused()) }
                },
                |failure| observed.push((failure.attempt, failure.next_delay)),
            )
            .await;

        assert!(matches!(
            result,
            Err(OpcUaError::Supervisor(SupervisorError::RetriesExhausted { attempts: 3, .. }))
        ));
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(1));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(2));
        assert_eq!(
            observed,
            vec![
                (1, Some(Duration::from_secs(1))),
                (2, Some(Duration::from_secs(2))),
                (3, None),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_returns_first_success() {
        let driver = RetryDriver::new(
            RetryPolicy::new(3, Duration::from_secs(1)),
            CancellationToken::new(),
        );

        let result = driver
            .run(
                |attempt| async move {
                    if attempt < 2 {
                        Err(refused())
                    } else {
                        Ok(attempt)
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stops_on_non_retryable() {
        let driver = RetryDriver::new(
            RetryPolicy::new(5, Duration::from_secs(1)),
            CancellationToken::new(),
        );

        let mut calls = 0;
        let result: OpcUaResult<()> = driver
            .run(
                |_| {
                    calls += 1;
                    async {
                        Err(OpcUaError::connection(ConnectionError::AuthenticationFailed {
                            username: "admin1".into(),
                        }))
                    }
                },
                |_| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_retrying_all_errors_spends_budget() {
        let driver = RetryDriver::new(
            RetryPolicy::new(3, Duration::from_secs(1)),
            CancellationToken::new(),
        )
        .retrying_all_errors();

        let mut delays = Vec::new();
        let result: OpcUaResult<()> = driver
            .run(
                |_| async {
                    Err(OpcUaError::connection(ConnectionError::AuthenticationFailed {
                        username: "admin1".into(),
                    }))
                },
                |failure| delays.push(failure.next_delay),
            )
            .await;

        assert!(matches!(
            result,
            Err(OpcUaError::Supervisor(SupervisorError::RetriesExhausted { attempts: 3, .. }))
        ));
        assert_eq!(
            delays,
            vec![Some(Duration::from_secs(1)), Some(Duration::from_secs(2)), None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_cancelled_during_wait() {
        let cancel = CancellationToken::new();
        let driver = RetryDriver::new(RetryPolicy::new(3, Duration::from_secs(60)), cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let result: OpcUaResult<()> = driver.run(|_| async { Err(refused()) }, |_| {}).await;

        assert!(matches!(
            result,
            Err(OpcUaError::Supervisor(SupervisorError::ShuttingDown))
        ));
        canceller.await.unwrap();
    }
}
