//! Bounded exponential backoff and fixed timeouts for provider calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::domain::ProviderError;

/// Status and balance queries.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Generation and extension requests.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Stem separation requests.
pub const STEM_TIMEOUT: Duration = Duration::from_secs(60);

/// Relative jitter applied to every delay (±20%).
const JITTER: f64 = 0.2;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Generation requests: losing one costs the user a submission.
    pub const CRITICAL: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1000),
        max_delay: Duration::from_millis(30_000),
        multiplier: 2.0,
    };

    pub const STANDARD: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_millis(10_000),
        multiplier: 2.0,
    };

    /// Interactive lookups where a stale answer beats a slow one.
    pub const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(300),
        max_delay: Duration::from_millis(3000),
        multiplier: 1.5,
    };

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let ms = self.initial_delay.as_millis() as f64 * exp;
        Duration::from_millis(ms.min(self.max_delay.as_millis() as f64) as u64)
    }

    /// Delay before retry number `attempt` with ±20% jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let factor = 1.0 + rand::rng().random_range(-JITTER..=JITTER);
        let ms = (base * factor).min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(label, attempts = attempt, error = %e, "Giving up");
                }
                return Err(e);
            }
        }
    }
}

/// Fail with [`ProviderError::Timeout`] if `fut` takes longer than `limit`.
pub async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TINY: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    };

    #[test]
    fn test_base_delay_grows_and_caps() {
        let p = RetryPolicy::CRITICAL;
        assert_eq!(p.base_delay(1), Duration::from_millis(1000));
        assert_eq!(p.base_delay(2), Duration::from_millis(2000));
        assert_eq!(p.base_delay(3), Duration::from_millis(4000));
        assert_eq!(p.base_delay(10), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let p = RetryPolicy::STANDARD;
        for _ in 0..100 {
            let d = p.delay_for(2).as_millis();
            assert!((800..=1200).contains(&d), "delay {d} out of range");
        }
        for _ in 0..100 {
            assert!(p.delay_for(20) <= p.max_delay);
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&TINY, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Network("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&TINY, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::RateLimited) }
        })
        .await;
        assert_eq!(result, Err(ProviderError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&TINY, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Api {
                    status: 401,
                    message: "unauthorized".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ProviderError::Timeout(10)));
    }
}
