use crate::error::{Error, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub fn create_backoff(max_retries: u32, base_delay_ms: u64) -> ExponentialBackoff<backoff::SystemClock> {
    ExponentialBackoff {
        current_interval: Duration::from_millis(base_delay_ms),
        initial_interval: Duration::from_millis(base_delay_ms),
        randomization_factor: 0.5,
        multiplier: 2.0,
        max_interval: Duration::from_secs(30),
        max_elapsed_time: Some(Duration::from_secs(max_retries as u64 * 30)),
        ..ExponentialBackoff::default()
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or `max_retries` attempts have been made.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    max_retries: u32,
    base_delay_ms: u64,
    operation_name: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = create_backoff(max_retries, base_delay_ms);
    let mut attempts = 0;

    loop {
        attempts += 1;

        let err: Error = match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempts >= max_retries {
            warn!(
                operation = operation_name,
                attempts,
                error = %err,
                "Operation failed after max retries"
            );
            return Err(err);
        }

        match backoff.next_backoff() {
            Some(duration) => {
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    retry_after_ms = duration.as_millis(),
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
            None => {
                warn!(
                    operation = operation_name,
                    attempts,
                    error = %err,
                    "Backoff exhausted"
                );
                return Err(err);
            }
        }
    }
}
