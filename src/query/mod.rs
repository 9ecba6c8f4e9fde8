//! EXPLAIN provider.
//!
//! - `explain` : the [`explain::ExplainProvider`] seam and the sqlx-backed `SqliteExplainer`
//! - `retry` : retry logic for transient lock and pool failures
//!
//! The module also provides a generic [`with_timeout`] helper and
//! [`retry_within_deadline`], which bounds a retried operation by one
//! overall deadline. The analyzer has no deadline of its own, so timeouts
//! are imposed here.

pub mod explain;
pub mod retry;

use std::future::Future;

use retry::retry_on_transient_error;

/// Retry `operation` on transient errors, with `timeout_ms` covering every
/// attempt and backoff together.
pub async fn retry_within_deadline<F, Fut, T>(
    timeout_ms: u64,
    max_retries: u32,
    operation_name: &str,
    operation: F,
) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    with_timeout(
        timeout_ms,
        operation_name,
        retry_on_transient_error(operation, max_retries, operation_name),
    )
    .await
}

/// Execute an async operation with an optional timeout.
///
/// If `timeout_ms > 0`, wraps the future in `tokio::time::timeout`.
/// If the timeout elapses, returns an error message that mentions the operation name
/// and suggests adjusting `SQLITE_QUERY_TIMEOUT`.
///
/// If `timeout_ms == 0`, runs the future without a timeout.
pub async fn with_timeout<T, F>(timeout_ms: u64, operation_name: &str, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    if timeout_ms > 0 {
        tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), fut)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "{} timed out after {}ms. Set SQLITE_QUERY_TIMEOUT to adjust.",
                    operation_name,
                    timeout_ms
                )
            })?
    } else {
        fut.await
    }
}
