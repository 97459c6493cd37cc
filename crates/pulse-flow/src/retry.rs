//! Bounded retry with exponential backoff.
//!
//! External-service calls are the dominant failure source in the pipeline,
//! so every one of them runs under a [`RetryPolicy`]. The policy never loops
//! indefinitely: attempts are capped and backoff doubles per attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// A bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    base: Duration,
}

impl RetryPolicy {
    /// Creates a policy making at most `attempts` attempts, waiting
    /// `base * 2^n` between them.
    #[must_use]
    pub const fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts: if attempts == 0 { 1 } else { attempts },
            base,
        }
    }

    /// Policy that tries exactly once.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `operation` until it succeeds or attempts are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.base;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    tracing::warn!(
                        operation = what,
                        attempt,
                        error = %err,
                        "external call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
