use std::collections::HashMap;

use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::analyzer::lexical::normalize;
use crate::analyzer::opcode::OpcodeRow;
use crate::query::explain::ExplainProvider;
use crate::schema::CatalogSnapshot;

/// In-memory SQLite pool with `ddl` applied. One connection, since every
/// connection to `:memory:` is a separate database.
pub async fn memory_pool(ddl: &[&str]) -> SqlitePool {
    let opts = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("memory_pool: failed to open in-memory database");
    for stmt in ddl {
        sqlx::query(stmt)
            .execute(&pool)
            .await
            .unwrap_or_else(|e| panic!("memory_pool: `{stmt}` failed: {e}"));
    }
    pool
}

/// EXPLAIN provider answering from canned traces, keyed by normalized SQL.
/// Unknown statements fail like SQL that does not compile.
#[derive(Default)]
pub struct StaticExplainer {
    traces: HashMap<String, Vec<OpcodeRow>>,
}

impl StaticExplainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, sql: &str, rows: Vec<OpcodeRow>) -> Self {
        self.traces.insert(normalize(sql), rows);
        self
    }
}

impl ExplainProvider for StaticExplainer {
    async fn explain(&self, sql: &str) -> Result<Vec<OpcodeRow>> {
        self.traces
            .get(&normalize(sql))
            .cloned()
            .ok_or_else(|| anyhow!("no such table in statement: {sql}"))
    }
}

/// `t(id INTEGER PRIMARY KEY, name TEXT)` on root page 2.
pub fn id_name_catalog() -> CatalogSnapshot {
    CatalogSnapshot::new().with_table("t", 2, &["id", "name"], Some("id"))
}

/// `t(name, age)` on root 2 with `idx_name_age(name, age)` on root 3.
pub fn name_age_catalog() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_table("t", 2, &["name", "age"], None)
        .with_index("idx_name_age", 3, "t", &["name", "age"])
}

/// `t(x, y, z)` on root 2 with `idx_yx(y, x)` and `idx_xy(x, y)`.
pub fn xyz_catalog() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_table("t", 2, &["x", "y", "z"], None)
        .with_index("idx_yx", 3, "t", &["y", "x"])
        .with_index("idx_xy", 4, "t", &["x", "y"])
}
