//! Error text sent to MCP clients. Database file paths, addresses and
//! driver noise are stripped before anything leaves the process.

use regex::Regex;
use rmcp::model::{CallToolResult, Content};
use std::sync::LazyLock;

static UNIX_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[\w./-]+/[\w./-]+").unwrap());

static WINDOWS_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]:\\[\w.\\/-]+").unwrap());

static IP_PORT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}:\d{1,5}\b").unwrap());

static IP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap());

static OS_ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(os error \d+\)").unwrap());

// sqlx wraps engine errors as "error returned from database: (code: 1) ..."
static DRIVER_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error returned from database:\s*(\(code: \d+\)\s*)?").unwrap());

static MULTIPLE_SPACES_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub(crate) fn sanitize_error(error: &str) -> String {
    tracing::debug!("Original error (before sanitization): {}", error);

    let mut sanitized = DRIVER_PREFIX_REGEX.replace_all(error, "").to_string();

    // Paths first; they can contain IP-like sequences
    sanitized = UNIX_PATH_REGEX
        .replace_all(&sanitized, "[REDACTED]")
        .to_string();
    sanitized = WINDOWS_PATH_REGEX
        .replace_all(&sanitized, "[REDACTED]")
        .to_string();

    sanitized = IP_PORT_REGEX
        .replace_all(&sanitized, "[REDACTED]")
        .to_string();
    sanitized = IP_REGEX.replace_all(&sanitized, "[REDACTED]").to_string();

    sanitized = OS_ERROR_REGEX.replace_all(&sanitized, "").to_string();

    sanitized = MULTIPLE_SPACES_REGEX
        .replace_all(&sanitized, " ")
        .to_string();
    sanitized = sanitized.trim().to_string();

    if sanitized.ends_with(':') || sanitized.ends_with(',') {
        sanitized.pop();
    }

    sanitized
}

pub(crate) fn error_response(message: impl Into<String>) -> CallToolResult {
    let sanitized = sanitize_error(&message.into());
    CallToolResult::error(vec![Content::text(sanitized)])
}

/// `Ok(error_response(..))` with format arguments, for tool handlers.
///
/// ```ignore
/// tool_error!("Missing required argument: sql");
/// tool_error!("Table '{}' not found", table);
/// ```
#[macro_export]
macro_rules! tool_error {
    ($msg:expr) => {
        Ok($crate::server::error::error_response($msg))
    };
    ($fmt:expr, $($arg:expr),+ $(,)?) => {
        Ok($crate::server::error::error_response(format!($fmt, $($arg),+)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_driver_prefix() {
        let error = "EXPLAIN failed: error returned from database: (code: 1) no such table: orders";
        assert_eq!(sanitize_error(error), "EXPLAIN failed: no such table: orders");
    }

    #[test]
    fn test_sanitize_os_error() {
        let error = "unable to open database file (os error 2)";
        assert_eq!(sanitize_error(error), "unable to open database file");
    }

    #[test]
    fn test_sanitize_unix_path() {
        let error = "failed to open SQLite database '/srv/data/app.db': unable to open database file";
        assert_eq!(
            sanitize_error(error),
            "failed to open SQLite database '[REDACTED]': unable to open database file"
        );
    }

    #[test]
    fn test_sanitize_windows_path() {
        let error = r"cannot read C:\data\app.db now";
        assert_eq!(sanitize_error(error), "cannot read [REDACTED] now");
    }

    #[test]
    fn test_sanitize_ip_port() {
        let error = "Connection to 192.168.1.1:3306 failed";
        assert_eq!(sanitize_error(error), "Connection to [REDACTED] failed");
    }

    #[test]
    fn test_preserves_safe_content() {
        let error = "near \"FORM\": syntax error";
        assert_eq!(sanitize_error(error), "near \"FORM\": syntax error");
    }
}
