use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Error patterns that indicate a transient SQLite failure: another
/// connection holds a lock, or the pool had no free connection in time.
/// Retrying is safe because EXPLAIN never writes.
const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "database schema has changed",
    "sqlite_busy",
    "pool timed out",
];

/// Check if an error message indicates a transient failure.
fn is_transient_error(error: &anyhow::Error) -> bool {
    let error_string = format!("{:#}", error).to_lowercase();
    TRANSIENT_ERROR_PATTERNS.iter().any(|pattern| {
        error_string.contains(&pattern.to_lowercase())
    })
}

/// Execute an async operation with retry logic for transient lock and pool failures.
///
/// # Arguments
/// * `operation` - Async closure that performs the database operation
/// * `max_retries` - Maximum number of retry attempts (not including the initial attempt)
/// * `operation_name` - Human-readable name for logging purposes
///
/// # Behavior
/// - Executes the operation once initially
/// - On transient errors (locked database, busy handler exhausted, pool timeout), retries up to max_retries times
/// - Uses exponential backoff: 100ms, 200ms, 400ms, etc. between retries
/// - Logs retry attempts with tracing::warn
/// - Returns immediately on non-transient errors (syntax errors, unknown tables or columns)
pub async fn retry_on_transient_error<F, Fut, T>(
    operation: F,
    max_retries: u32,
    operation_name: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let max_attempts = max_retries + 1; // initial attempt + retries

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                // Check if we've exhausted all attempts
                if attempt >= max_attempts {
                    tracing::error!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "{} failed after all retry attempts",
                        operation_name
                    );
                    return Err(e);
                }

                // Only retry on transient errors
                if !is_transient_error(&e) {
                    tracing::debug!(
                        attempt = attempt,
                        error = %e,
                        "{} failed with non-transient error, not retrying",
                        operation_name
                    );
                    return Err(e);
                }

                // Calculate backoff: 100ms * 2^attempt (100ms, 200ms, 400ms, ...)
                let backoff_ms = 100u64 * (1u64 << (attempt - 1).min(10)); // cap at ~100s
                let backoff = Duration::from_millis(backoff_ms);

                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "{} failed with transient error, retrying",
                    operation_name
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}
