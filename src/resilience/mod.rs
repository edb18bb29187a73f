//! Resilience patterns for the resumable upload engine.
//!
//! The engine's retryable unit of work is a single chunk PUT attempt. The
//! [`Pacer`] executes such an attempt with exponential backoff and a bounded
//! retry count; the attempt itself decides whether it is retryable by
//! returning `(again, error)` from its closure.

use crate::errors::UploadError;
use std::future::Future;
use std::time::Duration;

/// Retry configuration for exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Multiplier applied to the backoff after each failed attempt.
    pub multiplier: f64,
    /// Whether to add jitter to the computed backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Outcome of one attempt inside [`Pacer::call`].
///
/// `again` tells the Pacer whether to retry; `result` is the attempt's own
/// outcome, which the Pacer returns verbatim once it stops retrying.
pub struct Attempt<T> {
    /// Whether the Pacer should retry this operation.
    pub again: bool,
    /// The attempt's result (an error here does not by itself force a retry;
    /// `again` is authoritative, matching the Go `(bool, error)` contract).
    pub result: Result<T, UploadError>,
}

impl<T> Attempt<T> {
    /// A terminal success: never retried.
    pub fn done(value: T) -> Self {
        Self {
            again: false,
            result: Ok(value),
        }
    }

    /// A terminal failure: never retried.
    pub fn fatal(err: UploadError) -> Self {
        Self {
            again: false,
            result: Err(err),
        }
    }

    /// A failure that should be retried, subject to the Pacer's bounds.
    pub fn retry(err: UploadError) -> Self {
        Self {
            again: true,
            result: Err(err),
        }
    }
}

/// Executes retryable chunk-attempt operations with exponential backoff,
/// gated by a per-endpoint rate limit.
///
/// The per-endpoint rate limit is realized here as the inter-attempt backoff
/// itself (this engine talks to exactly one endpoint per session, the
/// session URI); a shared multi-session limiter is outside this crate's
/// scope.
pub struct Pacer {
    config: RetryConfig,
}

impl Pacer {
    /// Creates a new Pacer with the given retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `op` to completion, retrying while it reports `again = true` and
    /// the attempt budget is not exhausted.
    pub async fn call<F, Fut, T>(&self, mut op: F) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut attempt_number: u32 = 0;
        loop {
            attempt_number += 1;
            let Attempt { again, result } = op().await;

            if !again || attempt_number >= self.config.max_attempts {
                return result;
            }

            let backoff = calculate_backoff(attempt_number, &self.config);
            tracing::debug!(attempt = attempt_number, ?backoff, "retrying after backoff");
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Calculates the backoff duration for a given (1-based) attempt number.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_backoff.as_secs_f64();
    let exp = config.multiplier.powi(attempt.saturating_sub(1) as i32);
    let mut delay = base * exp;

    let max = config.max_backoff.as_secs_f64();
    if delay > max {
        delay = max;
    }

    if config.jitter {
        use rand::Rng;
        let jitter = rand::thread_rng().gen_range(0.0..=delay * 0.1);
        delay += jitter;
    }

    Duration::from_secs_f64(delay)
}

/// Default retry predicate mapping an [`UploadError`] to a retry decision.
pub fn should_retry(error: &UploadError) -> bool {
    error.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_without_jitter() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(calculate_backoff(1, &config), Duration::from_secs(1));
        assert_eq!(calculate_backoff(2, &config), Duration::from_secs(2));
        assert_eq!(calculate_backoff(3, &config), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped_at_max() {
        let config = RetryConfig {
            max_attempts: 20,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: false,
        };
        assert!(calculate_backoff(10, &config) <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn pacer_retries_until_success() {
        let pacer = Pacer::new(RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 1.0,
            jitter: false,
        });

        let mut calls = 0;
        let result = pacer
            .call(|| {
                calls += 1;
                let this_call = calls;
                async move {
                    if this_call < 3 {
                        Attempt::retry(UploadError::Transport("nope".into()))
                    } else {
                        Attempt::done(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn pacer_gives_up_after_max_attempts() {
        let pacer = Pacer::new(RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 1.0,
            jitter: false,
        });

        let mut calls = 0;
        let result: Result<(), UploadError> = pacer
            .call(|| {
                calls += 1;
                async move { Attempt::retry(UploadError::Transport("still nope".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn fatal_attempt_is_never_retried() {
        let pacer = Pacer::new(RetryConfig::default());
        let mut calls = 0;
        let result: Result<(), UploadError> = pacer
            .call(|| {
                calls += 1;
                async move {
                    Attempt::fatal(UploadError::Http {
                        status: 400,
                        message: "bad".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
