use crate::config::Config;

// eprintln! because this runs before the logging system starts.

fn parse_env_num<T: std::str::FromStr>(key: &str) -> Option<T> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => match v.parse::<T>() {
            Ok(n) => Some(n),
            Err(_) => {
                eprintln!(
                    "Warning: {} is set to {:?} but could not be parsed as a number; using default",
                    key, v
                );
                None
            }
        },
        _ => None,
    }
}

fn parse_bool_env(key: &str) -> Option<bool> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => {
                eprintln!(
                    "Warning: {} is set to {:?} but is not a recognized boolean \
                     (true/false/1/0/yes/no); using default",
                    key, v
                );
                None
            }
        },
        _ => None,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse all environment variables into overrides for the TOML base.
/// Only sets fields where the env var is actually present.
pub fn load_env_config() -> EnvConfig {
    EnvConfig {
        db_path: non_empty_env("SQLITE_DB_PATH"),
        read_only: parse_bool_env("SQLITE_READ_ONLY"),
        create_if_missing: parse_bool_env("SQLITE_CREATE_IF_MISSING"),
        pool_size: parse_env_num::<u32>("SQLITE_POOL_SIZE"),
        query_timeout_ms: parse_env_num::<u64>("SQLITE_QUERY_TIMEOUT"),
        connect_timeout_ms: parse_env_num::<u64>("SQLITE_CONNECT_TIMEOUT"),
        cache_ttl_secs: parse_env_num::<u64>("SQLITE_CACHE_TTL"),
        max_retries: parse_env_num::<u32>("SQLITE_MAX_RETRIES"),
        analyze_subqueries: parse_bool_env("SQLITE_ANALYZE_SUBQUERIES"),
        suggest_covering: parse_bool_env("SQLITE_SUGGEST_COVERING"),
        log_level: non_empty_env("SQLITE_LOG_LEVEL"),
    }
}

/// All env var overrides (None = not set, don't override).
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub db_path: Option<String>,
    pub read_only: Option<bool>,
    pub create_if_missing: Option<bool>,
    pub pool_size: Option<u32>,
    pub query_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub analyze_subqueries: Option<bool>,
    pub suggest_covering: Option<bool>,
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Apply env var overrides onto a base Config, returning the merged result.
    pub fn apply_to(self, mut base: Config) -> Config {
        if let Some(v) = self.db_path {
            base.database.path = v;
        }
        if let Some(v) = self.read_only {
            base.database.read_only = v;
        }
        if let Some(v) = self.create_if_missing {
            base.database.create_if_missing = v;
        }
        if let Some(v) = self.pool_size {
            base.pool.size = v;
        }
        if let Some(v) = self.query_timeout_ms {
            base.pool.query_timeout_ms = v;
        }
        if let Some(v) = self.connect_timeout_ms {
            base.pool.connect_timeout_ms = v;
        }
        if let Some(v) = self.cache_ttl_secs {
            base.pool.cache_ttl_secs = v;
        }
        if let Some(v) = self.max_retries {
            base.pool.max_retries = v;
        }
        if let Some(v) = self.analyze_subqueries {
            base.analyzer.analyze_subqueries = v;
        }
        if let Some(v) = self.suggest_covering {
            base.analyzer.suggest_covering = v;
        }
        if let Some(v) = self.log_level {
            base.monitoring.log_level = v;
        }
        base
    }
}
