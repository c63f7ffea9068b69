//! Timeout utilities for automation calls
//!
//! Every CDP round-trip is bounded so a wedged frame surfaces as a
//! [`AutomationError::Timeout`] on the current branch instead of hanging a
//! worker forever.

use std::future::Future;
use std::time::Duration;

use crate::automation::{AutomationError, AutomationResult};

/// Run `operation` with an explicit deadline
///
/// # Returns
/// * `Ok(T)` - Operation completed successfully
/// * `Err(Timeout)` - The deadline passed first
/// * `Err(_)` - The operation itself failed
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> AutomationResult<T>
where
    F: Future<Output = AutomationResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(AutomationError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn times_out_slow_operations() {
        let result: AutomationResult<()> = with_page_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "slow op",
        )
        .await;
        assert!(matches!(result, Err(AutomationError::Timeout { ref operation, .. }) if operation == "slow op"));
    }

    #[tokio::test]
    async fn passes_through_results() {
        let result = with_page_timeout(async { Ok(7) }, Duration::from_secs(1), "fast op").await;
        assert_eq!(result, Ok(7));
    }
}
