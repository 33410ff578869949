use std::{fmt::Display, time::Duration};

use bon::Builder;
use reqwest::StatusCode;
use tokio::time::{error::Elapsed, sleep, timeout};

use crate::{core::error::RegisterError, prelude::*};

/// Tells whether another attempt may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for Error {
    /// Client errors are final, everything else is worth another attempt.
    fn is_transient(&self) -> bool {
        self.chain()
            .find_map(|cause| cause.downcast_ref::<reqwest::Error>())
            .and_then(reqwest::Error::status)
            .is_none_or(|status| {
                status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
            })
    }
}

impl Transient for RegisterError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

/// Bounded timeout and retries with exponential backoff, shared by all the collaborators.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct RetryPolicy {
    /// Timeout of every single attempt.
    timeout: Duration,

    /// Total number of attempts, including the first one.
    #[builder(default = 3)]
    n_attempts: u32,

    /// Delay before the first retry, doubled on every subsequent one.
    #[builder(default = Duration::from_millis(500))]
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Elapsed> + Transient + Display,
    {
        let n_attempts = self.n_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            let error = match timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(elapsed) => E::from(elapsed),
            };
            if attempt >= n_attempts || !error.is_transient() {
                return Err(error);
            }
            warn!(attempt, n_attempts, backoff = ?backoff, "{error:#}, retrying…");
            sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(n_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .timeout(Duration::from_millis(50))
            .n_attempts(n_attempts)
            .initial_backoff(Duration::ZERO)
            .build()
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() -> Result {
        let n_calls = AtomicU32::new(0);
        let value = policy(3)
            .run(|| async {
                if n_calls.fetch_add(1, Ordering::Relaxed) < 2 { Err(anyhow!("flaky")) } else { Ok(42) }
            })
            .await?;
        assert_eq!(value, 42);
        assert_eq!(n_calls.load(Ordering::Relaxed), 3);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_all_attempts() {
        let n_calls = AtomicU32::new(0);
        let result: Result<()> = policy(2)
            .run(|| async {
                n_calls.fetch_add(1, Ordering::Relaxed);
                Err(anyhow!("down"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(n_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let n_calls = AtomicU32::new(0);
        let result: Result<(), RegisterError> = policy(3)
            .run(|| async {
                n_calls.fetch_add(1, Ordering::Relaxed);
                Err(RegisterError::Rejected { address: 40348, reason: "IllegalDataValue".into() })
            })
            .await;
        assert!(matches!(result, Err(RegisterError::Rejected { .. })));
        assert_eq!(n_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn timeout_is_a_communication_failure() {
        let result: Result<(), RegisterError> = policy(1)
            .run(|| async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RegisterError::Communication(_))));
    }
}
