use std::future::Future;

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, ValueRef};

use super::retry_within_deadline;
use crate::analyzer::opcode::OpcodeRow;

/// Source of opcode traces. `explain` fails when the statement does not
/// compile against the live schema.
pub trait ExplainProvider: Sync {
    fn explain(&self, sql: &str) -> impl Future<Output = Result<Vec<OpcodeRow>>> + Send;
}

/// Runs `EXPLAIN <sql>` on a SQLite pool.
#[derive(Clone)]
pub struct SqliteExplainer {
    pool: SqlitePool,
    query_timeout_ms: u64,
    max_retries: u32,
}

impl SqliteExplainer {
    pub fn new(pool: SqlitePool, query_timeout_ms: u64, max_retries: u32) -> Self {
        Self {
            pool,
            query_timeout_ms,
            max_retries,
        }
    }
}

impl ExplainProvider for SqliteExplainer {
    async fn explain(&self, sql: &str) -> Result<Vec<OpcodeRow>> {
        let pool = &self.pool;
        let rows = retry_within_deadline(self.query_timeout_ms, self.max_retries, "EXPLAIN", || {
            fetch_trace(pool, sql)
        })
        .await?;
        tracing::debug!(rows = rows.len(), "Fetched opcode trace");
        Ok(rows)
    }
}

/// One `EXPLAIN` round trip. Columns are `addr, opcode, p1, p2, p3, p4, p5, comment`.
pub async fn fetch_trace(pool: &SqlitePool, sql: &str) -> Result<Vec<OpcodeRow>> {
    let explain_sql = format!("EXPLAIN {}", sql.trim().trim_end_matches(';'));
    let rows: Vec<SqliteRow> = sqlx::query(&explain_sql)
        .fetch_all(pool)
        .await
        .context("EXPLAIN failed")?;

    rows.iter()
        .map(|row| {
            Ok(OpcodeRow {
                address: row.try_get::<i64, _>(0)?,
                opcode: row.try_get::<String, _>(1)?,
                p1: operand(row, 2)?,
                p2: operand(row, 3)?,
                p3: operand(row, 4)?,
                p4: operand(row, 5)?,
                p5: operand(row, 6)?,
                comment: operand(row, 7)?.unwrap_or_default(),
            })
        })
        .collect()
}

/// Operand as text; SQL NULL stays `None` so it never reads as zero.
fn operand(row: &SqliteRow, index: usize) -> Result<Option<String>> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(None);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(Some(v.to_string()));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(Some(v.to_string()));
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Ok(Some(v));
    }
    let bytes: Vec<u8> = row.try_get(index)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
