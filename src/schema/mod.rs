//! Schema catalog: the read-only metadata the bytecode analyzer resolves
//! cursors and column positions against.
//!
//! # Submodules
//! - `snapshot` : `CatalogSnapshot`, an in-memory catalog implementing [`Catalog`]
//! - `cache` : `CacheEntry` TTL bookkeeping for the introspector
//! - `fetch` : raw SQL that loads a snapshot from `sqlite_master` and the pragmas
//! - `introspect` : `SchemaIntrospector`, a TTL-cached snapshot over a live pool
//! - `tests` : integration tests against an in-memory SQLite database (cfg(test) only)

pub(crate) mod cache;
pub(crate) mod fetch;
pub mod introspect;
pub mod snapshot;


pub use introspect::SchemaIntrospector;
pub use snapshot::CatalogSnapshot;

use serde::{Deserialize, Serialize};

/// Kind of a b-tree owned schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    Index,
}

/// The schema object that owns a root page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub name: String,
    pub kind: ObjectKind,
    /// Owning table for an index; empty for a table.
    pub owning_table: String,
    pub root_page: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub root_page: u64,
    /// Column names in declared order.
    pub columns: Vec<String>,
    pub primary_key: Option<String>,
}

/// Represents one index on a table: its name and the ordered list of column names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub root_page: u64,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// Lookups the analyzer needs from the schema. All name comparisons are
/// ASCII case-insensitive, matching SQLite identifier rules.
///
/// A miss is an empty answer, never an error: the analyzer drops the
/// affected attribution and keeps going.
pub trait Catalog: Send + Sync {
    fn object_by_root_page(&self, root_page: u64) -> Option<SchemaObject>;

    /// Root page of a table, used when a table unit is created eagerly for an
    /// index before the table itself is opened.
    fn table_root_page(&self, table: &str) -> Option<u64>;

    fn columns_of_table(&self, table: &str) -> Vec<String>;

    /// Index names of `table` in catalog-declared order.
    fn indexes_of_table(&self, table: &str) -> Vec<String>;

    fn columns_of_index(&self, index: &str) -> Vec<String>;

    fn primary_key_column(&self, table: &str) -> Option<String>;
}

/// Returns the position of `column` in `columns`, ignoring ASCII case.
pub fn column_position(columns: &[String], column: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(column))
}
