//! Bounded retry policy for transient upstream failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use recall_core::defaults::RETRY_BACKOFF_MS;
use recall_core::Result;

/// Run `operation`, retrying on transient upstream errors with the fixed
/// backoff schedule in [`RETRY_BACKOFF_MS`].
///
/// Non-transient errors (validation, auth, permanent upstream rejections)
/// fail immediately without a retry; exhausting the schedule surfaces the
/// last transient error to the caller.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < RETRY_BACKOFF_MS.len() => {
                let delay_ms = RETRY_BACKOFF_MS[attempt];
                warn!(
                    subsystem = "inference",
                    component = "retry",
                    op = op_name,
                    attempt = attempt,
                    delay_ms = delay_ms,
                    error = %e,
                    "Transient upstream failure, retrying"
                );
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = AtomicUsize::new(0);

        let result = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::UpstreamTransient("overloaded".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_bounded() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::UpstreamTransient("still overloaded".into())) }
        })
        .await;

        assert!(result.is_err());
        // Initial call plus one per backoff slot.
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_BACKOFF_MS.len() + 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::UpstreamPermanent("quota exceeded".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_immediate_success_makes_one_call() {
        let calls = AtomicUsize::new(0);

        let result = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
