use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::FsResult;

/// Retry policy for storage calls.
///
/// Only transient errors (see [`crate::FsError::is_transient`]) are retried; everything else
/// is returned on the first failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt with no delay.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Retries without waiting between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }

    pub async fn run<T, F, Fut>(&self, action: &str, mut op: F) -> FsResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FsResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.attempts,
                        "{action} failed, retrying: {err}"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
