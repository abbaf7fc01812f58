//! Fail-open utilities for graceful degradation
//!
//! The interactive session must never halt because a peripheral operation failed.
//! Use these for things like re-reading an edited project during preview or
//! persisting a project after generation.
//!
//! DO NOT use fail-open for:
//! - Generation requests (faults are surfaced to the user)
//! - Archive export (faults are surfaced to the user)
//! - Applying extracted files to a graph

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use buildora_core::fail_open::fail_open;
/// use buildora_core::Result;
///
/// async fn reload_project() -> Result<String> {
///     Ok("{}".to_string())
/// }
///
/// async fn example() {
///     let latest = fail_open("preview::reload", || reload_project()).await;
///     // latest is None if the reload failed; the previous snapshot stays live
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Like [`fail_open`] but retried with a linear backoff of `100ms * attempt`
pub async fn fail_open_with_retries<F, Fut, T>(
    operation_name: &str,
    mut f: F,
    max_retries: usize,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_retries {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) => {
                if attempt == max_retries {
                    warn!(
                        "{} failed after {} attempts (fail-open): {}",
                        operation_name, max_retries, e
                    );
                    return None;
                }
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_retries, e
                );
                let delay_ms = 100 * attempt as u64;
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildoraError;

    #[tokio::test]
    async fn test_fail_open_passes_value_through() {
        let result = fail_open("store::put", || async { Ok::<_, BuildoraError>("saved") }).await;
        assert_eq!(result, Some("saved"));
    }

    #[tokio::test]
    async fn test_fail_open_swallows_error() {
        let result = fail_open("store::put", || async {
            Err::<(), _>(BuildoraError::Store("disk full".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut attempts = 0;
        let result = fail_open_with_retries(
            "store::put",
            || {
                attempts += 1;
                let current = attempts;
                async move {
                    if current < 2 {
                        Err(BuildoraError::Store("locked".to_string()))
                    } else {
                        Ok(current)
                    }
                }
            },
            3,
        )
        .await;
        assert_eq!(result, Some(2));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mut attempts = 0;
        let result = fail_open_with_retries(
            "store::put",
            || {
                attempts += 1;
                async move { Err::<i32, _>(BuildoraError::Store("locked".to_string())) }
            },
            3,
        )
        .await;
        assert_eq!(result, None);
        assert_eq!(attempts, 3);
    }
}
