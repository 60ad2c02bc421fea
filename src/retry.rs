//! Bounded exponential-backoff executor.
//!
//! Delays come from `backon`'s [`ExponentialBuilder`]; this module adds the
//! pieces it does not model directly: a total elapsed-time budget, a
//! proportional randomization factor, and cancellable sleeps tied to the
//! process [`CancellationSignal`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use rand::Rng;
use tokio::time::Instant;

use crate::cancel::CancellationSignal;
use crate::config::BackoffConfig;

/// Exponential backoff policy.
///
/// Delays start at `initial_interval` and grow by `multiplier` up to
/// `max_interval`. Retrying stops when the operation succeeds, when the
/// next sleep would overrun `max_elapsed_time` (zero means no limit), or
/// when the cancellation signal fires.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_elapsed_time: Duration,
    randomization_factor: f64,
}

impl RetryPolicy {
    /// Builds a policy from the configured backoff parameters.
    #[must_use]
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::default()
            .with_initial_interval(config.initial_interval)
            .with_multiplier(config.multiplier)
            .with_max_interval(config.max_interval)
            .with_max_elapsed_time(config.max_elapsed_time)
            .with_randomization_factor(config.randomization_factor)
    }

    /// Sets the first delay between attempts.
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the growth factor. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Sets the cap on a single delay.
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets the total time budget. [`Duration::ZERO`] disables the limit.
    #[must_use]
    pub fn with_max_elapsed_time(mut self, budget: Duration) -> Self {
        self.max_elapsed_time = budget;
        self
    }

    /// Sets the jitter fraction, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Runs `operation` until it succeeds or the policy gives up.
    ///
    /// The operation always runs at least once. Sleeps between attempts
    /// end early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `operation` when the elapsed-time
    /// budget is exhausted or cancellation is observed.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationSignal,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let started = Instant::now();
        let mut delays = self.backoff().build();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if cancel.is_cancelled() {
                tracing::warn!(attempt, error = %err, "retry abandoned: cancelled");
                return Err(err);
            }

            let delay = self.jitter(delays.next().unwrap_or(self.max_interval));
            if !self.max_elapsed_time.is_zero()
                && started.elapsed().saturating_add(delay) > self.max_elapsed_time
            {
                tracing::warn!(
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "retry abandoned: elapsed time budget exhausted"
                );
                return Err(err);
            }

            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "operation failed, retrying after backoff"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    tracing::warn!(attempt, error = %err, "retry abandoned: cancelled");
                    return Err(err);
                }
            }
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_interval)
            .with_max_delay(self.max_interval)
            .with_factor(self.multiplier as f32)
            .without_max_times()
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.randomization_factor <= 0.0 {
            return delay;
        }
        let secs = delay.as_secs_f64();
        let spread = secs * self.randomization_factor;
        let jittered = rand::rng().random_range((secs - spread)..=(secs + spread));
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let defaults = BackoffConfig::default();
        Self {
            initial_interval: defaults.initial_interval,
            multiplier: defaults.multiplier,
            max_interval: defaults.max_interval,
            max_elapsed_time: defaults.max_elapsed_time,
            randomization_factor: defaults.randomization_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_interval(Duration::from_millis(1))
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_millis(4))
            .with_max_elapsed_time(Duration::from_secs(2))
            .with_randomization_factor(0.0)
    }

    #[tokio::test]
    async fn success_on_first_attempt_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<u32, String> = fast_policy()
            .execute(&CancellationSignal::new(), || {
                let counter = Arc::clone(&counter);
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
            })
            .await;
        assert_eq!(result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<&str, String> = fast_policy()
            .execute(&CancellationSignal::new(), || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("not yet".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_with_last_error_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let policy = fast_policy().with_max_elapsed_time(Duration::from_millis(30));
        let result: Result<(), String> = policy
            .execute(&CancellationSignal::new(), || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;
        let attempts = calls.load(Ordering::SeqCst);
        assert!(attempts > 1);
        assert_eq!(result, Err(format!("failure {}", attempts - 1)));
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationSignal::new();
        let policy = fast_policy()
            .with_initial_interval(Duration::from_secs(30))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(Duration::ZERO);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), &str> = tokio::time::timeout(
            Duration::from_secs(2),
            policy.execute(&cancel, || async { Err("broker down") }),
        )
        .await
        .unwrap_or(Ok(()));
        assert_eq!(result, Err("broker down"));
    }

    #[tokio::test]
    async fn already_cancelled_makes_single_attempt() {
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), &str> = fast_policy()
            .execute(&cancel, || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jitter_stays_within_randomization_window() {
        let policy = RetryPolicy::default().with_randomization_factor(0.5);
        for _ in 0..100 {
            let d = policy.jitter(Duration::from_millis(100));
            assert!(d >= Duration::from_millis(49) && d <= Duration::from_millis(151));
        }
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let policy = RetryPolicy::default()
            .with_multiplier(0.2)
            .with_randomization_factor(4.0);
        assert!((policy.multiplier - 1.0).abs() < f64::EPSILON);
        assert!((policy.randomization_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_config_copies_values() {
        let cfg = BackoffConfig {
            initial_interval: Duration::from_millis(10),
            multiplier: 3.0,
            max_interval: Duration::from_millis(100),
            max_elapsed_time: Duration::ZERO,
            randomization_factor: 0.0,
        };
        let policy = RetryPolicy::from_config(&cfg);
        assert_eq!(policy.initial_interval, Duration::from_millis(10));
        assert_eq!(policy.max_elapsed_time, Duration::ZERO);
    }
}
