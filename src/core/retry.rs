//! Bounded retry for transient provider failures
//!
//! Only errors for which [`ChatError::is_transient`] holds are retried.
//! Anything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, warn};

use crate::error::{ChatError, ChatResult};

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

/// Config-file spelling of the backoff strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total submissions, including the first
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_kind(max_attempts: u32, kind: BackoffKind, base: Duration) -> Self {
        let backoff = match kind {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: base,
                multiplier: 2.0,
                max: Duration::from_secs(10),
            },
        };
        Self::new(max_attempts, backoff)
    }

    /// Delay to wait after the given (1-based) failed attempt
    ///
    /// Exponential delays stop growing once they reach `max`; a multiplier
    /// that does not grow the delay keeps it at `initial`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let mut delay = initial.min(max);
                for _ in 1..attempt {
                    let next = match Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier) {
                        Ok(next) => next.min(max),
                        Err(_) => max,
                    };
                    if next <= delay {
                        break;
                    }
                    delay = next;
                }
                delay
            }
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> ChatResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ChatResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    error!("{} failed after {} attempts: {}", label, attempt, e);
                    return Err(ChatError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Backoff::Fixed(Duration::ZERO))
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = &AtomicU32::new(0);
        let result = quick(3)
            .run("upload", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ChatError::TransientUpload("precondition".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal() {
        let calls = &AtomicU32::new(0);
        let result: ChatResult<()> = quick(3)
            .run("upload", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChatError::TransientUpload("still busy".into()))
            })
            .await;

        assert!(matches!(
            result,
            Err(ChatError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: ChatResult<()> = quick(3)
            .run("upload", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChatError::ProcessingFailed {
                    name: "files/x".into(),
                    reason: "FAILED".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(ChatError::ProcessingFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::from_kind(5, BackoffKind::Exponential, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(10), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_delay_never_overflows() {
        let policy = RetryPolicy::from_kind(100, BackoffKind::Exponential, Duration::from_secs(1));
        assert_eq!(policy.delay_after(70), Duration::from_secs(10));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(10));

        let zero = RetryPolicy::from_kind(100, BackoffKind::Exponential, Duration::ZERO);
        assert_eq!(zero.delay_after(u32::MAX), Duration::ZERO);

        let wild = RetryPolicy::new(
            5,
            Backoff::Exponential {
                initial: Duration::from_millis(500),
                multiplier: f64::INFINITY,
                max: Duration::from_secs(3),
            },
        );
        assert_eq!(wild.delay_after(2), Duration::from_secs(3));
    }

    #[test]
    fn test_default_is_three_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
    }
}
