//! Fixed-count, fixed-interval polling
//!
//! Every bounded wait in a renewal run (DNS propagation polling, ACME
//! challenge verification) is expressed as a [`RetryPolicy`] value consumed by
//! [`poll_until`]. There is no backoff and no jitter.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay between two consecutive attempts.
    pub interval: Duration,
    /// Also wait `interval` before the very first attempt.
    pub delay_first: bool,
}

impl RetryPolicy {
    /// Attempts back to back, sleeping `interval` between them.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            delay_first: false,
        }
    }

    /// Same as [`RetryPolicy::fixed`], but every attempt (including the first)
    /// is preceded by a sleep.
    pub fn with_initial_delay(mut self) -> Self {
        self.delay_first = true;
        self
    }

    /// Sum of all sleeps when every attempt fails.
    pub fn worst_case_wait(&self) -> Duration {
        let sleeps = if self.delay_first {
            self.max_attempts
        } else {
            self.max_attempts.saturating_sub(1)
        };
        self.interval * sleeps
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Condition satisfied, stop polling.
    Done(T),
    /// Condition not satisfied yet, nothing went wrong.
    Pending,
    /// The attempt errored. Counts as a used attempt; polling continues.
    Failed(E),
}

/// Returned by [`poll_until`] when every attempt was used up.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    /// Error of the most recent failed attempt, if any attempt failed.
    pub last_error: Option<E>,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_error {
            Some(err) => write!(f, "gave up after {} attempt(s): {}", self.attempts, err),
            None => write!(f, "gave up after {} attempt(s)", self.attempts),
        }
    }
}

/// Run `attempt` until it reports [`Attempt::Done`] or the policy runs out.
///
/// The closure receives the 1-based attempt number. Sleeps use the tokio
/// timer, so they yield to the runtime instead of blocking a thread.
pub async fn poll_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut last_error = None;

    for n in 1..=policy.max_attempts {
        if n > 1 || policy.delay_first {
            tokio::time::sleep(policy.interval).await;
        }

        match attempt(n).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Pending => {
                trace!(attempt = n, max_attempts = policy.max_attempts, "Condition not met yet");
            }
            Attempt::Failed(err) => {
                trace!(attempt = n, max_attempts = policy.max_attempts, "Attempt failed");
                last_error = Some(err);
            }
        }
    }

    Err(RetryExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returns_without_sleeping() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<u32, RetryExhausted<String>> = poll_until(&policy, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Attempt::Done(n) }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_keeps_last_error() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let start = Instant::now();

        let result: Result<(), _> =
            poll_until(&policy, |n| async move { Attempt::Failed(format!("boom {}", n)) }).await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error.as_deref(), Some("boom 3"));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            exhausted.to_string(),
            "gave up after 3 attempt(s): boom 3"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_precedes_every_attempt() {
        let policy = RetryPolicy::fixed(4, Duration::from_secs(5)).with_initial_delay();
        let start = Instant::now();

        let result: Result<(), RetryExhausted<()>> =
            poll_until(&policy, |_| async { Attempt::Pending }).await;

        assert!(result.unwrap_err().last_error.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_pending_both_consume_attempts() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(1));

        let result: Result<u32, RetryExhausted<&str>> = poll_until(&policy, |n| async move {
            match n {
                1 => Attempt::Failed("resolver down"),
                2 | 3 => Attempt::Pending,
                _ => Attempt::Done(n),
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
    }

    #[test]
    fn test_worst_case_wait_without_initial_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(10));
        assert!(!policy.delay_first);
    }
}
