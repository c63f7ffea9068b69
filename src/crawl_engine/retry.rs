//! Retry with exponential backoff and jitter
//!
//! Delay for attempt `n` (0-based) is `base * 2^n + rand(0..base)`.

use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::crawl_types::FailureKind;
use crate::automation::AutomationResult;

/// Backoff delay before retry number `attempt`
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let exp = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let jitter = if base_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..base_ms)
    };
    Duration::from_millis(exp.saturating_add(jitter))
}

/// Poll `probe` until it yields `Some`, sleeping with backoff in between
///
/// `probe` receives the 0-based attempt number. Returns `None` once
/// `attempts` probes came back empty.
pub async fn poll_with_backoff<T, F, Fut>(
    attempts: u32,
    base: Duration,
    what: &str,
    mut probe: F,
) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..attempts {
        if let Some(found) = probe(attempt).await {
            return Some(found);
        }
        if attempt + 1 < attempts {
            let delay = backoff_delay(base, attempt);
            debug!("{what} not found (attempt {}/{attempts}), retrying in {delay:?}", attempt + 1);
            tokio::time::sleep(delay).await;
        }
    }
    None
}

/// Retry an automation call while its failures are retryable
///
/// Fails fast on permanent failures (script errors, closed sessions).
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    base: Duration,
    what: &str,
    mut op: F,
) -> AutomationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AutomationResult<T>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = FailureKind::classify(&e);
                if !kind.is_retryable() {
                    warn!("{what}: non-retryable failure, giving up: {e}");
                    return Err(e);
                }
                if retries >= max_retries {
                    warn!("{what}: max retries ({max_retries}) exceeded: {e}");
                    return Err(e);
                }
                let delay = backoff_delay(base, retries).mul_f64(kind.delay_multiplier());
                debug!("{what}: retryable failure, attempt {}/{max_retries}, retrying in {delay:?}: {e}", retries + 1);
                tokio::time::sleep(delay).await;
                retries += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_within_jitter() {
        let base = Duration::from_millis(100);
        for attempt in 0..4 {
            let delay = backoff_delay(base, attempt).as_millis() as u64;
            let floor = 100 * 2u64.pow(attempt);
            assert!(delay >= floor && delay < floor + 100, "attempt {attempt}: {delay}");
        }
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }

    #[tokio::test]
    async fn poll_stops_at_first_hit() {
        let calls = AtomicU32::new(0);
        let found = poll_with_backoff(5, Duration::from_millis(1), "frame", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { (attempt == 2).then_some(attempt) }
        })
        .await;
        assert_eq!(found, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_gives_up_after_attempts() {
        let found: Option<()> =
            poll_with_backoff(3, Duration::from_millis(1), "frame", |_| async { None }).await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AutomationResult<()> = retry_with_backoff(3, Duration::from_millis(1), "eval", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AutomationError::Script("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn soft_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, Duration::from_millis(1), "click", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AutomationError::NotFound("#x".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }
}
