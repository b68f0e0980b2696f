//! Retry with exponential backoff for idempotent index operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Backoff schedule for retried operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one. 1 disables retrying.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Delay multiplier applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// A schedule that runs the operation exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1)
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier).min(self.max_delay)
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    Failed { last_error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }
}

/// Classifies errors as transient (worth retrying) or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent. `label` names the operation in retry logs.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> RetryResult<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;

    loop {
        attempts += 1;

        let error = match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(error) => error,
        };

        if attempts >= config.max_attempts || !error.is_retryable() {
            return RetryResult::Failed {
                last_error: error,
                attempts,
            };
        }

        let backoff = delay + jitter(delay / 4);
        tracing::warn!(
            operation = label,
            attempt = attempts,
            backoff_ms = backoff.as_millis() as u64,
            "transient failure, retrying: {error}"
        );
        sleep(backoff).await;
        delay = config.next_delay(delay);
    }
}

/// Clock-derived jitter in `[0, max)`; spreads out concurrent retries.
fn jitter(max: Duration) -> Duration {
    let max_nanos = max.as_nanos() as u64;
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_nanos(seed % max_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(&'static str);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.0.contains("transient")
        }
    }

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts).with_initial_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "op", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>("ok")
        })
        .await;

        assert!(matches!(result, RetryResult::Success("ok")));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "op", || async {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TestError("transient"))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success("ok")));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(5), "op", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError("permanent"))
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 1),
            RetryResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_attempts_exhausted() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "op", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError("transient"))
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 3),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_runs_once() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::none(), "op", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError("transient"))
        })
        .await;

        assert!(result.into_result().is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::default().with_max_delay(Duration::from_millis(150));
        let next = config.next_delay(Duration::from_millis(100));
        assert_eq!(next, Duration::from_millis(150));
    }
}
