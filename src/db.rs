use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use crate::config::Config;

pub struct DbPool {
    pool: SqlitePool,
    pub config: Arc<Config>,
}

impl DbPool {
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let pool = build_pool(&config).await?;
        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn build_connect_options(config: &Config) -> SqliteConnectOptions {
    let base = if config.is_in_memory() {
        SqliteConnectOptions::new().in_memory(true)
    } else {
        SqliteConnectOptions::new()
            .filename(config.database.path.trim())
            .read_only(config.database.read_only)
            .create_if_missing(config.database.create_if_missing)
    };
    // EXPLAIN waits on writers holding the schema lock instead of failing fast.
    base.busy_timeout(Duration::from_millis(config.pool.query_timeout_ms))
        .statement_cache_capacity(100)
}

async fn build_pool(config: &Config) -> Result<SqlitePool> {
    let connect_options = build_connect_options(config);

    // Each connection to :memory: is its own empty database.
    let max_connections = if config.is_in_memory() { 1 } else { config.pool.size };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_millis(config.pool.connect_timeout_ms))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
        .with_context(|| format!("failed to open SQLite database '{}'", config.database.path))?;

    tracing::info!(
        path = %config.database.path,
        read_only = config.database.read_only,
        max_connections,
        "SQLite pool ready"
    );
    Ok(pool)
}
