use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::cache::CacheEntry;
use super::{fetch, Catalog, CatalogSnapshot};

/// Serves [`CatalogSnapshot`]s for a live database, re-reading the schema
/// when the cached copy is older than the TTL.
pub struct SchemaIntrospector {
    pool: sqlx::SqlitePool,
    cache_ttl: Duration,
    snapshot: Mutex<Option<CacheEntry<Arc<CatalogSnapshot>>>>,
}

impl SchemaIntrospector {
    pub fn new(pool: sqlx::SqlitePool, cache_ttl_secs: u64) -> Self {
        Self {
            pool,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            snapshot: Mutex::new(None),
        }
    }

    /// The current schema snapshot. Holding the lock across the fetch
    /// coalesces concurrent refreshes into one.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        let mut guard = self.snapshot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh(self.cache_ttl) {
                return Ok(Arc::clone(&entry.data));
            }
        }

        let fresh = Arc::new(fetch::fetch_snapshot(&self.pool).await?);
        if self.cache_ttl > Duration::ZERO {
            *guard = Some(CacheEntry::new(Arc::clone(&fresh)));
        }
        Ok(fresh)
    }

    /// Drop the cached snapshot so the next call re-reads the schema.
    pub async fn invalidate(&self) {
        *self.snapshot.lock().await = None;
    }

    /// Columns, primary key and indexes of one table as JSON.
    pub async fn table_info(&self, table: &str) -> Result<serde_json::Value> {
        let snapshot = self.snapshot().await?;
        let Some(def) = snapshot.table(table) else {
            bail!("Table '{}' not found", table);
        };

        let indexes: Vec<serde_json::Value> = snapshot
            .index_defs_of(&def.name)
            .into_iter()
            .map(|i| {
                serde_json::json!({
                    "name": i.name,
                    "unique": i.unique,
                    "columns": i.columns,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "table": def.name,
            "root_page": def.root_page,
            "columns": def.columns,
            "primary_key": snapshot.primary_key_column(&def.name),
            "indexes": indexes,
        }))
    }
}
