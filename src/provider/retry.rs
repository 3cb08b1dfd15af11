use std::future::Future;
use std::time::Duration;

/// How many times an operation is attempted and how long to wait between
/// attempts that ask for a backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no retry
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Classification of a failed attempt
#[derive(Debug)]
pub enum Attempt<E> {
    /// Try again straight away
    Retry(E),
    /// Wait for the policy's backoff, then try again
    Backoff(E),
    /// Give up without further attempts
    Abort(E),
}

impl<E> Attempt<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Retry(e) | Self::Backoff(e) | Self::Abort(e) => e,
        }
    }
}

/// Runs `op` until it succeeds, aborts, or the policy runs out of attempts
///
/// `op` receives the 1-based attempt number. The error of the last attempt is
/// returned. No backoff is slept after the final attempt.
///
/// # Example
///
/// ```
/// use manualforge::provider::{with_retry, Attempt, RetryPolicy};
/// use std::time::Duration;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let result: Result<u32, &str> = rt.block_on(with_retry(
///     RetryPolicy::new(3, Duration::ZERO),
///     |attempt| async move {
///         if attempt < 3 { Err(Attempt::Retry("not yet")) } else { Ok(attempt) }
///     },
/// ));
/// assert_eq!(result, Ok(3));
/// ```
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Abort(e)) => return Err(e),
            Err(failure) if attempt >= max_attempts => return Err(failure.into_inner()),
            Err(Attempt::Retry(_)) => {
                tracing::debug!("Attempt {}/{} failed, retrying", attempt, max_attempts);
            }
            Err(Attempt::Backoff(_)) => {
                tracing::debug!(
                    "Attempt {}/{} failed, retrying in {:?}",
                    attempt,
                    max_attempts,
                    policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_time() {
        let result: Result<&str, ()> =
            with_retry(RetryPolicy::new(3, Duration::ZERO), |_| async { Ok("done") }).await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test]
    async fn test_returns_last_error_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = with_retry(RetryPolicy::new(2, Duration::ZERO), |n| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Attempt::Backoff(format!("failure {}", n)))
            }
        })
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abort_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), &str> = with_retry(RetryPolicy::new(5, Duration::ZERO), |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Attempt::Abort("fatal"))
            }
        })
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_waits_between_attempts() {
        let started = std::time::Instant::now();
        let result: Result<u32, &str> =
            with_retry(RetryPolicy::new(3, Duration::from_millis(20)), |n| async move {
                if n < 3 {
                    Err(Attempt::Backoff("busy"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
