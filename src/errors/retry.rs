use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::types::GateError;

/// Backoff and attempt-count configuration for one scan executor invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Adds up to one second of random delay on top of the computed backoff.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

/// Transient per-invocation retry state. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Number of attempts already made.
    pub attempt: u32,
    /// error_type of the last failure, for logging.
    pub last_error_type: Option<&'static str>,
}

/// What the executor should do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given delay, then try again.
    Retry { delay: Duration },
    GiveUp,
}

impl RetryPolicy {
    /// Backoff delay before the next attempt: base * 2^(attempts_made - 1),
    /// capped at `max_delay`. Deterministic; jitter is applied separately
    /// by the async driver.
    pub fn backoff_delay(&self, attempts_made: u32) -> Duration {
        let exp = self
            .base_delay
            .as_secs_f64()
            * 2.0_f64.powi(attempts_made.saturating_sub(1).min(30) as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }

    /// Pure retry decision: retry only if the error is transient and the
    /// attempt budget is not exhausted.
    pub fn decide(&self, state: &RetryState, error: &GateError) -> RetryDecision {
        if !error.is_transient() || state.attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.backoff_delay(state.attempt),
        }
    }
}

/// Drive an async operation through the retry state machine.
///
/// Transient failures are retried with exponential backoff until the policy
/// gives up, at which point the last error is surfaced as `RetryExhausted`.
/// Non-transient failures abort immediately with the original error.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut factory: F,
) -> Result<T, GateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GateError>>,
{
    let mut state = RetryState::default();

    loop {
        state.attempt += 1;
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();
                state.last_error_type = Some(classification.error_type);

                match policy.decide(&state, &e) {
                    RetryDecision::GiveUp => {
                        if !classification.retryable {
                            warn!(
                                operation = operation_name,
                                error_type = classification.error_type,
                                "Non-retryable error, failing immediately"
                            );
                            return Err(e);
                        }
                        warn!(
                            operation = operation_name,
                            attempts = state.attempt,
                            error_type = classification.error_type,
                            "Retry budget exhausted"
                        );
                        return Err(GateError::RetryExhausted {
                            attempts: state.attempt,
                            last: Box::new(e),
                        });
                    }
                    RetryDecision::Retry { delay } => {
                        let delay = if policy.jitter {
                            delay + Duration::from_secs_f64(rand::random::<f64>())
                        } else {
                            delay
                        };
                        warn!(
                            operation = operation_name,
                            attempt = state.attempt,
                            max = policy.max_attempts,
                            error_type = classification.error_type,
                            delay_secs = delay.as_secs_f64(),
                            error = %e,
                            "Retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
