// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded retry with exponential backoff for DNS provider calls.
//!
//! Admission webhooks are called synchronously by the Kubernetes API server,
//! so every call to a DNS backend must finish within a bounded time. Each
//! attempt runs under its own timeout; transient failures (transport errors,
//! timeouts, SERVFAIL, throttling) are retried with jittered exponential
//! backoff until either the attempt budget or the overall elapsed budget is
//! spent. Permanent failures (authoritative rejections) fail immediately.

use crate::constants::{
    DEFAULT_DNS_MAX_ATTEMPTS, DEFAULT_DNS_TIMEOUT_MS, PROVIDER_INITIAL_INTERVAL_MILLIS,
    PROVIDER_MAX_ELAPSED_MILLIS, PROVIDER_MAX_INTERVAL_MILLIS,
};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Failure of a single provider call attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The attempt did not complete within the per-attempt timeout
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The provider or transport reported a failure
    #[error("{message}")]
    Failed {
        /// Human-readable failure including any provider payload
        message: String,
        /// Provider response / error code, if any
        code: Option<String>,
        /// Whether a retry may succeed
        transient: bool,
    },
}

impl CallError {
    /// A failure that is worth retrying.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            code: None,
            transient: true,
        }
    }

    /// A failure that will not go away by retrying.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            code: None,
            transient: false,
        }
    }

    /// Attach a provider response / error code.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            Self::Failed {
                message, transient, ..
            } => Self::Failed {
                message,
                code: Some(code.into()),
                transient,
            },
            timeout @ Self::Timeout(_) => timeout,
        }
    }

    /// Whether a retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Failed { transient, .. } => *transient,
        }
    }

    /// Provider response / error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Timeout(_) => Some("Timeout"),
            Self::Failed { code, .. } => code.as_deref(),
        }
    }
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Get the next backoff interval and advance the schedule.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jittered
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Timeout and retry budget for one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Timeout applied to every single attempt
    pub attempt_timeout: Duration,
    /// Maximum number of attempts, first try included (minimum 1)
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub initial_interval: Duration,
    /// Cap on the backoff between attempts
    pub max_interval: Duration,
    /// No new attempt is started once this much time has passed
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_DNS_TIMEOUT_MS),
            DEFAULT_DNS_MAX_ATTEMPTS,
        )
    }
}

impl RetryPolicy {
    /// Policy with the given attempt timeout and attempt count, default backoff.
    #[must_use]
    pub fn new(attempt_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            attempt_timeout,
            max_attempts: max_attempts.max(1),
            initial_interval: Duration::from_millis(PROVIDER_INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_millis(PROVIDER_MAX_INTERVAL_MILLIS),
            max_elapsed_time: Duration::from_millis(PROVIDER_MAX_ELAPSED_MILLIS),
        }
    }

    /// Fresh backoff schedule for one call.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
        }
    }
}

/// Run a provider call under the retry policy.
///
/// Every attempt is bounded by `policy.attempt_timeout` and by what is left of
/// `max_elapsed_time`, so the whole call never runs longer than the latter.
/// Transient failures are retried until `max_attempts` or `max_elapsed_time`
/// is reached; permanent failures are returned immediately.
///
/// # Errors
///
/// Returns the last [`CallError`] once the call fails permanently or the
/// retry budget is exhausted.
pub async fn retry_provider_call<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut backoff = policy.backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        // No attempt may outlive the elapsed budget
        let attempt_timeout = policy
            .attempt_timeout
            .min(policy.max_elapsed_time.saturating_sub(start_time.elapsed()));

        let result = match tokio::time::timeout(attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(attempt_timeout)),
        };

        let err = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Provider call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_transient() {
            error!(
                operation = operation_name,
                error = %err,
                "Non-retryable provider error, failing immediately"
            );
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            error!(
                operation = operation_name,
                attempt = attempt,
                error = %err,
                "Retry attempts exhausted, giving up"
            );
            return Err(err);
        }

        let delay = backoff.next_backoff();
        if start_time.elapsed() + delay >= policy.max_elapsed_time {
            error!(
                operation = operation_name,
                attempt = attempt,
                elapsed = ?start_time.elapsed(),
                error = %err,
                "Max retry time exceeded, giving up"
            );
            return Err(err);
        }

        warn!(
            operation = operation_name,
            attempt = attempt,
            retry_after = ?delay,
            error = %err,
            "Retryable provider error, will retry"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
