//! Task Runner with Circuit Breaker Pattern
//!
//! Repeats one unit of work with exponential backoff between failures and gives up
//! after too many consecutive failures, so the caller can shut down cleanly.

use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, warn};

/// Circuit breaker configuration for background tasks
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Maximum number of consecutive failures before giving up
    pub max_consecutive_failures: u32,
    /// Initial delay between retries
    pub initial_retry_delay: Duration,
    /// Maximum delay between retries
    pub max_retry_delay: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            initial_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(300),
        }
    }
}

/// Returned when a task trips the breaker
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Task '{task_name}' exceeded maximum consecutive failures ({failures}). Last error: {last_error}")]
pub struct TaskFailure {
    pub task_name: String,
    pub failures: u32,
    pub last_error: String,
}

/// Internal state for circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    consecutive_failures: u32,
    current_retry_delay: Duration,
}

impl CircuitBreakerState {
    fn new(initial_delay: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            current_retry_delay: initial_delay,
        }
    }

    fn record_failure(&mut self, max_delay: Duration) {
        self.consecutive_failures += 1;
        // Exponential backoff with cap
        self.current_retry_delay = std::cmp::min(self.current_retry_delay * 2, max_delay);
    }

    fn reset(&mut self, initial_delay: Duration) {
        self.consecutive_failures = 0;
        self.current_retry_delay = initial_delay;
    }
}

/// Run a recurring task with circuit breaker protection
///
/// `task_fn` runs one iteration and returns how long to wait before the next one.
/// Failures are retried with exponential backoff.
///
/// # Arguments
/// * `task_name` - Name of the task for logging purposes
/// * `config` - Circuit breaker configuration
/// * `task_fn` - Async function that executes one iteration of the task
///
/// # Errors
/// Returns [`TaskFailure`] after `max_consecutive_failures` consecutive failures.
/// Never returns `Ok` on its own; stop it by dropping the future.
pub async fn run_with_circuit_breaker<F, Fut, E>(
    task_name: &str,
    config: CircuitBreakerConfig,
    mut task_fn: F,
) -> Result<(), TaskFailure>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Duration, E>>,
    E: std::fmt::Display,
{
    let mut state = CircuitBreakerState::new(config.initial_retry_delay);

    loop {
        match task_fn().await {
            Ok(next_run_in) => {
                // Reset circuit breaker on success
                if state.consecutive_failures > 0 {
                    warn!(
                        "Task '{}' recovered after {} failures",
                        task_name, state.consecutive_failures
                    );
                }
                state.reset(config.initial_retry_delay);
                sleep(next_run_in).await;
            }
            Err(e) => {
                state.record_failure(config.max_retry_delay);
                error!(
                    "Task '{}' failed (attempt {}/{}): {}",
                    task_name, state.consecutive_failures, config.max_consecutive_failures, e
                );

                if state.consecutive_failures >= config.max_consecutive_failures {
                    return Err(TaskFailure {
                        task_name: task_name.to_string(),
                        failures: state.consecutive_failures,
                        last_error: e.to_string(),
                    });
                }

                // Apply exponential backoff before retry
                warn!(
                    "Task '{}' will retry in {:?}",
                    task_name, state.current_retry_delay
                );
                sleep(state.current_retry_delay).await;
            }
        }
    }
}
