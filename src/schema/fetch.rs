use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use super::{CatalogSnapshot, IndexDef, TableDef};

// Pragma columns can come back NULL (expression index members, rowid slots).
fn col_str_opt(row: &SqliteRow, col: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(col)
        .ok()
        .flatten()
        .filter(|s| !s.is_empty())
}

/// Load every b-tree backed table and index from `sqlite_master`, in
/// declaration order, together with their column lists.
pub(crate) async fn fetch_snapshot(pool: &SqlitePool) -> Result<CatalogSnapshot> {
    let objects = sqlx::query(
        r#"SELECT type, name, tbl_name, rootpage
           FROM sqlite_master
           WHERE type IN ('table', 'index') AND rootpage > 0
           ORDER BY rowid"#,
    )
    .fetch_all(pool)
    .await?;

    let mut snapshot = CatalogSnapshot::new();
    for row in &objects {
        let kind: String = row.try_get("type")?;
        let name: String = row.try_get("name")?;
        let table: String = row.try_get("tbl_name")?;
        let root_page: i64 = row.try_get("rootpage")?;
        let root_page = u64::try_from(root_page).unwrap_or_default();

        if kind == "table" {
            let (columns, primary_key) = fetch_table_columns(pool, &name).await?;
            snapshot.tables.push(TableDef {
                name,
                root_page,
                columns,
                primary_key,
            });
        } else {
            let columns = fetch_index_columns(pool, &name).await?;
            let unique = fetch_index_unique(pool, &table, &name).await?;
            snapshot.indexes.push(IndexDef {
                name,
                table,
                root_page,
                unique,
                columns,
            });
        }
    }

    tracing::debug!(
        tables = snapshot.tables.len(),
        indexes = snapshot.indexes.len(),
        "Loaded schema snapshot"
    );
    Ok(snapshot)
}

/// Columns of `table` in declared order plus its primary-key column. Only the
/// first member of a composite key is reported.
pub(crate) async fn fetch_table_columns(
    pool: &SqlitePool,
    table: &str,
) -> Result<(Vec<String>, Option<String>)> {
    let rows = sqlx::query("SELECT name, pk FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    let mut primary_key = None;
    for row in &rows {
        let Some(name) = col_str_opt(row, "name") else {
            continue;
        };
        let pk: i64 = row.try_get("pk").unwrap_or(0);
        if pk == 1 {
            primary_key = Some(name.clone());
        }
        columns.push(name);
    }
    Ok((columns, primary_key))
}

pub(crate) async fn fetch_index_columns(pool: &SqlitePool, index: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
        .bind(index)
        .fetch_all(pool)
        .await?;
    // Expression members have no name; keep the slot so positions stay aligned.
    Ok(rows
        .iter()
        .map(|row| col_str_opt(row, "name").unwrap_or_else(|| "<expr>".to_string()))
        .collect())
}

async fn fetch_index_unique(pool: &SqlitePool, table: &str, index: &str) -> Result<bool> {
    let unique: Option<i64> =
        sqlx::query_scalar(r#"SELECT "unique" FROM pragma_index_list(?) WHERE name = ?"#)
            .bind(table)
            .bind(index)
            .fetch_optional(pool)
            .await?;
    Ok(unique.unwrap_or(0) != 0)
}
