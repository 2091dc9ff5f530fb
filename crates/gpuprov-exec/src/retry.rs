//! Bounded retry for package-manager and network operations
//!
//! Fixed attempt count, fixed inter-attempt delay, no backoff growth.
//! Wrapped operations must be idempotent; nothing is rolled back between
//! attempts.

use crate::traits::{CommandOutput, CommandRunner, Fetcher};
use gpuprov_core::{ProvisionError, ProvisionResult, RetryPolicy};
use std::future::Future;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Retry an operation under the given policy
///
/// Returns the first success; fails only after exhausting every attempt.
pub async fn run_with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> ProvisionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProvisionResult<T>>,
{
    let mut last_error = String::new();
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed: {}",
                    what
                );
                last_error = e.to_string();
                if attempt < policy.max_attempts {
                    sleep(Duration::from_secs(policy.delay_secs)).await;
                }
            }
        }
    }
    Err(ProvisionError::RetriesExhausted(format!(
        "{}: {}",
        what, last_error
    )))
}

/// Retry a command until it exits zero
pub async fn run_checked_with_retries(
    runner: &dyn CommandRunner,
    policy: &RetryPolicy,
    program: &str,
    args: &[&str],
) -> ProvisionResult<CommandOutput> {
    run_with_retries(policy, &format!("{} {}", program, args.join(" ")), || {
        runner.run_checked(program, args)
    })
    .await
}

/// Retry a download until it lands
pub async fn fetch_with_retries(
    fetcher: &dyn Fetcher,
    policy: &RetryPolicy,
    url: &str,
    dest: &Path,
) -> ProvisionResult<()> {
    run_with_retries(policy, &format!("fetch {}", url), || fetcher.fetch(url, dest)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = run_with_retries(&fast_policy(10), "flaky op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err(ProvisionError::Command("transient".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_first_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        run_with_retries(&fast_policy(10), "steady op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_never_exceeds_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = run_with_retries(&fast_policy(3), "doomed op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProvisionError::Command("nope".to_string())) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, ProvisionError::RetriesExhausted(_)));
        assert!(err.to_string().contains("doomed op"));
    }
}
