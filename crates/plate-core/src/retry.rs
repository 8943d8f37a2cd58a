//! Retry policy for collaborator calls
//!
//! Only collaborator initialisation retries; every other call is attempted once
//! and its failure is either surfaced or absorbed by the caller.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// Delay grows with the attempt number: `step * attempt`
    Linear(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Upper bound for a single attempt; `None` waits indefinitely
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Policy used when initialising collaborators (3 attempts, 2s/4s backoff, 10s per attempt)
    pub fn collaborator_init() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear(Duration::from_secs(2)),
            attempt_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// A single attempt with no timeout
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
            attempt_timeout: None,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
        }
    }

    /// Run `op` until it succeeds or attempts run out
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_or_else(label, op, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_exhausted` with the last error
    /// once every attempt has failed
    pub async fn run_or_else<T, F, Fut, G>(
        &self,
        label: &str,
        mut op: F,
        on_exhausted: G,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce(&Error),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, op(attempt)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(format!(
                        "{} did not finish within {}s",
                        label,
                        limit.as_secs_f64()
                    ))),
                },
                None => op(attempt).await,
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(label, attempts = max_attempts, "Giving up: {}", e);
                    on_exhausted(&e);
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::collaborator_init()
    }
}
