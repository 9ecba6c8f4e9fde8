use serde::{Deserialize, Serialize};

pub mod toml_config;
pub mod env_config;
pub mod merge;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub analyzer: AnalyzerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file, or `:memory:`.
    pub path: String,
    /// Open the file with `SQLITE_OPEN_READONLY`.
    pub read_only: bool,
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    pub size: u32,
    pub query_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// TTL of the cached schema snapshot. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Retries of an EXPLAIN that failed with a transient lock error.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub analyze_subqueries: bool,
    /// Attach a `CREATE INDEX` suggestion to tables with no covering index.
    pub suggest_covering: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            read_only: true,
            create_if_missing: false,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            query_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            cache_ttl_secs: 60,
            max_retries: 2,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            analyze_subqueries: true,
            suggest_covering: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.path.trim().is_empty() {
            anyhow::bail!("Config error: database.path / SQLITE_DB_PATH is not set");
        }

        // Pool size must be 1..=64
        if self.pool.size == 0 {
            anyhow::bail!("Config error: SQLITE_POOL_SIZE cannot be 0 (got 0)");
        }
        if self.pool.size > 64 {
            anyhow::bail!(
                "Config error: SQLITE_POOL_SIZE unreasonably large: {} (max 64)",
                self.pool.size
            );
        }

        // Timeouts must be at least 100ms
        if self.pool.query_timeout_ms < 100 {
            anyhow::bail!(
                "Config error: SQLITE_QUERY_TIMEOUT must be at least 100ms (got {}ms)",
                self.pool.query_timeout_ms
            );
        }
        if self.pool.connect_timeout_ms < 100 {
            anyhow::bail!(
                "Config error: SQLITE_CONNECT_TIMEOUT must be at least 100ms (got {}ms)",
                self.pool.connect_timeout_ms
            );
        }

        let level = self.monitoring.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            anyhow::bail!(
                "Config error: unknown log level {:?} (expected one of {})",
                self.monitoring.log_level,
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    /// True when the database lives in memory and every connection would
    /// see a different, empty database.
    pub fn is_in_memory(&self) -> bool {
        let path = self.database.path.trim();
        path == ":memory:" || path.starts_with("file::memory:")
    }
}
