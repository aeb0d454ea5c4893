//! Retry policy
//!
//! Retries an async operation while a caller-supplied predicate classifies the
//! error as retryable. Stops on a retry-count cap, a cumulative wait budget, or
//! both, whichever is reached first.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a retried operation finally failed
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The error was not retryable; the operation ran once
    #[error("{0}")]
    Permanent(E),

    /// Retry cap or wait budget reached
    #[error("gave up after {attempts} attempts ({waited:?} waited): {last}")]
    Exhausted {
        last: E,
        attempts: u32,
        waited: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    /// Delay growth per retry; 1.0 keeps the delay fixed
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Maximum number of retries after the first attempt
    pub max_retries: Option<u32>,
    /// Stop once the total time slept reaches this budget
    pub max_wait: Option<Duration>,
    /// Randomize each delay into `[delay / 2, delay]`
    pub jitter: bool,
}

impl RetryPolicy {
    /// Fixed delay until `max_wait` of cumulative sleep has been spent
    pub fn fixed(delay: Duration, max_wait: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_retries: None,
            max_wait: Some(max_wait),
            jitter: false,
        }
    }

    /// Doubling delay, at most `max_retries` retries
    pub fn exponential(initial_delay: Duration, max_retries: u32) -> Self {
        Self {
            initial_delay,
            multiplier: 2.0,
            max_delay: Duration::from_secs(120),
            max_retries: Some(max_retries),
            max_wait: None,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Throttled task definition deregistration: 5s steps, 20s budget
    pub fn deregistration() -> Self {
        Self::fixed(Duration::from_secs(5), Duration::from_secs(20))
    }

    /// "Rate exceeded" during a deploy run: 2s, 4s, 8s... up to 5 retries
    pub fn deploy() -> Self {
        Self::exponential(Duration::from_secs(2), 5).with_jitter()
    }

    /// Delay before retry number `retry` (0-based), without jitter
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let millis = base.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(millis / 2..=millis))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// policy is exhausted.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, mut retryable: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempts = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempts += 1;

            if !retryable(&err) {
                return Err(RetryError::Permanent(err));
            }

            let out_of_retries = self.max_retries.is_some_and(|max| attempts > max);
            let out_of_time = self.max_wait.is_some_and(|max| waited >= max);
            if out_of_retries || out_of_time {
                return Err(RetryError::Exhausted {
                    last: err,
                    attempts,
                    waited,
                });
            }

            let delay = self.delay(attempts - 1);
            tracing::info!("Request is throttled ({}). Waiting {:?}...", err, delay);
            tokio::time::sleep(delay).await;
            waited += delay;
        }
    }
}
