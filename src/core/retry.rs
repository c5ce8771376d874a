//! Retry utilities for handling transient errors in async operations
//!
//! Two policies are provided: a throttling-aware policy with widening jitter
//! used for cloud-provider calls, and a simpler fixed exponential backoff used
//! for generic operations (process execution, HTTP calls).

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy for throttling-classified operations
#[derive(Debug, Clone)]
pub struct ThrottlingRetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for ThrottlingRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Retry policy for operations where any error is considered transient
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Errors that can classify themselves as throttling responses
///
/// Only throttling errors are retried by [`retry_throttling`]; everything else
/// propagates to the caller on the first attempt.
pub trait ThrottlingError {
    fn is_throttling(&self) -> bool;
}

/// Terminal outcome of a throttling-aware retry loop
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The wrapped operation failed with a non-retryable error
    #[error(transparent)]
    Operation(E),
    /// Every attempt was throttled
    #[error("maximum attempts reached calling operation: {operation}")]
    Exhausted { operation: String },
}

/// Execute an async operation, retrying throttled attempts with widening jitter
///
/// Attempt `i` (zero-based) sleeps for a random duration drawn from
/// `[delay, delay + i + 1]` seconds before the next try, then doubles `delay`.
/// Non-throttling errors propagate immediately. Exhausting all attempts yields
/// [`RetryError::Exhausted`] naming the operation.
pub async fn retry_throttling<F, T, E, Fut>(
    operation_name: &str,
    policy: &ThrottlingRetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: ThrottlingError + std::fmt::Display,
{
    let mut delay = policy.base_delay;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if error.is_throttling() => {
                log::debug!(
                    "Operation '{}' throttled on attempt {}/{}: {}",
                    operation_name,
                    attempt + 1,
                    policy.max_attempts,
                    error
                );
                let ceiling = delay + Duration::from_secs(attempt as u64 + 1);
                sleep(jittered(delay, ceiling)).await;
                delay *= 2;
            }
            Err(error) => return Err(RetryError::Operation(error)),
        }
    }

    Err(RetryError::Exhausted {
        operation: operation_name.to_string(),
    })
}

/// Execute an async operation with fixed exponential backoff on any error
///
/// The delay before attempt `i` is `base_delay * 2^(i-1)`, no jitter. The last
/// error is returned once attempts are exhausted.
pub async fn retry_backoff<F, T, E, Fut>(
    operation_name: &str,
    policy: &BackoffPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                last_error = Some(error);
                if attempt < policy.max_attempts - 1 {
                    let delay = policy.base_delay * 2u32.pow(attempt as u32);
                    log::debug!(
                        "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                        operation_name,
                        attempt + 1,
                        policy.max_attempts,
                        delay,
                        last_error.as_ref().unwrap()
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

fn jittered(floor: Duration, ceiling: Duration) -> Duration {
    use rand::Rng;
    let secs = rand::rng().random_range(floor.as_secs_f64()..=ceiling.as_secs_f64());
    Duration::from_secs_f64(secs)
}
